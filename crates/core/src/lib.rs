pub mod analysis;
pub mod domain;
pub mod form;
pub mod market;
pub mod page;
pub mod subscription;
pub mod view;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    use crate::subscription::{Subscription, Tier, User};

    const DEFAULT_ANALYSIS_LATENCY_MS: u64 = 1500;
    const DEFAULT_MARKET_REFRESH_DELAY_MS: u64 = 1000;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AnalysisBackend {
        Simulated,
        Anthropic,
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub analysis_backend: Option<String>,
        pub analysis_latency_ms: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub market_data_base_url: Option<String>,
        pub market_data_api_key: Option<String>,
        pub market_refresh_delay_ms: Option<String>,
        pub subscription_tier: Option<String>,
        pub subscription_remaining: Option<String>,
        pub user: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                analysis_backend: std::env::var("ANALYSIS_BACKEND").ok(),
                analysis_latency_ms: std::env::var("ANALYSIS_LATENCY_MS").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL").ok(),
                market_data_api_key: std::env::var("MARKET_DATA_API_KEY").ok(),
                market_refresh_delay_ms: std::env::var("MARKET_REFRESH_DELAY_MS").ok(),
                subscription_tier: std::env::var("SUBSCRIPTION_TIER").ok(),
                subscription_remaining: std::env::var("SUBSCRIPTION_REMAINING").ok(),
                user: std::env::var("MARKETLENS_USER").ok(),
            })
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_market_data_base_url(&self) -> anyhow::Result<&str> {
            self.market_data_base_url
                .as_deref()
                .context("MARKET_DATA_BASE_URL is required")
        }

        pub fn analysis_backend(&self) -> anyhow::Result<AnalysisBackend> {
            match self.analysis_backend.as_deref().map(str::trim) {
                None | Some("") | Some("simulated") => Ok(AnalysisBackend::Simulated),
                Some("anthropic") => Ok(AnalysisBackend::Anthropic),
                Some(other) => anyhow::bail!(
                    "ANALYSIS_BACKEND must be 'simulated' or 'anthropic' (got {other:?})"
                ),
            }
        }

        pub fn analysis_latency(&self) -> anyhow::Result<Duration> {
            parse_millis(
                "ANALYSIS_LATENCY_MS",
                self.analysis_latency_ms.as_deref(),
                DEFAULT_ANALYSIS_LATENCY_MS,
            )
        }

        pub fn market_refresh_delay(&self) -> anyhow::Result<Duration> {
            parse_millis(
                "MARKET_REFRESH_DELAY_MS",
                self.market_refresh_delay_ms.as_deref(),
                DEFAULT_MARKET_REFRESH_DELAY_MS,
            )
        }

        /// Subscription snapshot handed to the form and dashboard. The quota
        /// defaults to the tier's full monthly allowance.
        pub fn subscription(&self) -> anyhow::Result<Subscription> {
            let tier = match self.subscription_tier.as_deref() {
                Some(s) => s.parse::<Tier>()?,
                None => Tier::Free,
            };
            let mut subscription = Subscription::for_tier(tier);
            if let Some(s) = self.subscription_remaining.as_deref() {
                subscription.remaining_analysis = s
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("SUBSCRIPTION_REMAINING is not an integer: {s}"))?;
            }
            Ok(subscription)
        }

        pub fn user(&self) -> User {
            let name = self
                .user
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("demo");
            User::new(name)
        }
    }

    fn parse_millis(key: &str, raw: Option<&str>, default_ms: u64) -> anyhow::Result<Duration> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Duration::from_millis(default_ms));
        };
        let ms = raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be a number of milliseconds (got {raw})"))?;
        Ok(Duration::from_millis(ms))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn empty() -> Settings {
            Settings {
                analysis_backend: None,
                analysis_latency_ms: None,
                anthropic_api_key: None,
                sentry_dsn: None,
                market_data_base_url: None,
                market_data_api_key: None,
                market_refresh_delay_ms: None,
                subscription_tier: None,
                subscription_remaining: None,
                user: None,
            }
        }

        #[test]
        fn defaults_match_simulated_timings() {
            let settings = empty();
            assert_eq!(settings.analysis_backend().unwrap(), AnalysisBackend::Simulated);
            assert_eq!(settings.analysis_latency().unwrap(), Duration::from_millis(1500));
            assert_eq!(settings.market_refresh_delay().unwrap(), Duration::from_millis(1000));
        }

        #[test]
        fn rejects_unknown_backend() {
            let settings = Settings {
                analysis_backend: Some("openai".to_string()),
                ..empty()
            };
            assert!(settings.analysis_backend().is_err());
        }

        #[test]
        fn subscription_override_keeps_tier_features() {
            let settings = Settings {
                subscription_tier: Some("pro".to_string()),
                subscription_remaining: Some("3".to_string()),
                ..empty()
            };
            let sub = settings.subscription().unwrap();
            assert_eq!(sub.tier, Tier::Pro);
            assert_eq!(sub.remaining_analysis, 3);
            assert_eq!(sub.features.analysis_per_month, 200);
        }
    }
}
