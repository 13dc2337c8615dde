//! Reconciler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default slack added to the requeue delay after a key rotation pass, so
/// the wake-up lands just past the rotation deadline rather than exactly
/// on it.
pub const DEFAULT_REQUEUE_SLACK: Duration = Duration::from_secs(60);

/// Default token lifetime applied when a Jwt's declared lifetime cannot
/// be parsed.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(600);

/// Tunable parameters shared by the reconcilers.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use tokator_controller::config::ReconcilerConfig;
///
/// let config = ReconcilerConfig::builder()
///     .requeue_slack(Duration::from_secs(30))
///     .build();
/// assert_eq!(config.requeue_slack, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Slack added to the RotatingKey requeue delay.
    #[serde(with = "humantime_serde", default = "default_requeue_slack")]
    pub requeue_slack: Duration,

    /// Fallback token lifetime for unparseable Jwt lifetimes.
    #[serde(with = "humantime_serde", default = "default_token_lifetime")]
    pub default_token_lifetime: Duration,
}

fn default_requeue_slack() -> Duration {
    DEFAULT_REQUEUE_SLACK
}

fn default_token_lifetime() -> Duration {
    DEFAULT_TOKEN_LIFETIME
}

#[bon::bon]
impl ReconcilerConfig {
    /// Creates a reconciler configuration.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_REQUEUE_SLACK)] requeue_slack: Duration,
        #[builder(default = DEFAULT_TOKEN_LIFETIME)] default_token_lifetime: Duration,
    ) -> Self {
        Self { requeue_slack, default_token_lifetime }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            requeue_slack: DEFAULT_REQUEUE_SLACK,
            default_token_lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.requeue_slack, Duration::from_secs(60));
        assert_eq!(config.default_token_lifetime, Duration::from_secs(600));
    }

    #[test]
    fn test_builder_defaults_match_default_impl() {
        let built = ReconcilerConfig::builder().build();
        assert_eq!(built.requeue_slack, ReconcilerConfig::default().requeue_slack);
        assert_eq!(
            built.default_token_lifetime,
            ReconcilerConfig::default().default_token_lifetime
        );
    }

    #[test]
    fn test_deserializes_humantime_durations() {
        let config: ReconcilerConfig = serde_json::from_str(
            r#"{"requeue_slack": "2m", "default_token_lifetime": "15m"}"#,
        )
        .unwrap();
        assert_eq!(config.requeue_slack, Duration::from_secs(120));
        assert_eq!(config.default_token_lifetime, Duration::from_secs(900));
    }

    #[test]
    fn test_deserializes_empty_object_with_defaults() {
        let config: ReconcilerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.requeue_slack, DEFAULT_REQUEUE_SLACK);
    }
}
