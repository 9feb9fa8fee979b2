pub mod domain;
pub mod ingest;
pub mod screen;
pub mod time;

pub mod config {
    use anyhow::Context;

    const DEFAULT_DATA_PROVIDER_BASE_URL: &str = "https://www.alphavantage.co/api/v2";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub sentry_dsn: Option<String>,
        pub data_provider_base_url: String,
        pub data_provider_api_key: Option<String>,
        pub screen_symbols: Vec<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                data_provider_base_url: std::env::var("DATA_PROVIDER_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_DATA_PROVIDER_BASE_URL.to_string()),
                data_provider_api_key: std::env::var("DATA_PROVIDER_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                screen_symbols: std::env::var("SCREEN_SYMBOLS")
                    .map(|s| parse_symbol_list(&s))
                    .unwrap_or_default(),
            })
        }

        pub fn require_data_provider_api_key(&self) -> anyhow::Result<&str> {
            self.data_provider_api_key
                .as_deref()
                .context("DATA_PROVIDER_API_KEY is required")
        }
    }

    /// Splits a comma separated ticker list, trimming and upper-casing each entry.
    pub fn parse_symbol_list(s: &str) -> Vec<String> {
        s.split(',')
            .map(|part| part.trim().to_ascii_uppercase())
            .filter(|part| !part.is_empty())
            .collect()
    }

}
