// HTTP client creation with custom user-agent support
use crate::error::Result as BwResult;
use std::time::Duration;
use tracing::warn;

/// Environment variable that overrides the user agent sent to the bridge
pub const USER_AGENT_ENV: &str = "BRIDGEWATCH_USER_AGENT";

/// Create the shared HTTP client used to poll the bridge
///
/// `custom_user_agent` wins over `BRIDGEWATCH_USER_AGENT`, which wins over
/// the crate default.
///
/// # Errors
///
/// Will return `Err` if the TLS backend or client builder cannot be initialized
pub fn new(custom_user_agent: Option<&str>, timeout: Duration) -> BwResult<reqwest::Client> {
    let user_agent = resolve_user_agent(custom_user_agent);

    let mut builder = reqwest::Client::builder().timeout(timeout);

    // An invalid header value falls back to the default user agent
    if reqwest::header::HeaderValue::from_str(&user_agent).is_ok() {
        builder = builder.user_agent(user_agent);
    } else {
        warn!("Ignoring invalid user agent {:?}", user_agent);
        builder = builder.user_agent(super::USER_AGENT);
    }

    Ok(builder.build()?)
}

fn resolve_user_agent(custom_user_agent: Option<&str>) -> String {
    custom_user_agent.map_or_else(
        || std::env::var(USER_AGENT_ENV).unwrap_or_else(|_| super::USER_AGENT.to_string()),
        str::to_string,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_user_agent_wins() {
        assert_eq!(resolve_user_agent(Some("probe/2.0")), "probe/2.0");
    }

    #[test]
    fn test_client_builds_with_invalid_user_agent() {
        let client = new(Some("\u{007F}InvalidAgent"), Duration::from_secs(1));
        assert!(client.is_ok());
    }
}
