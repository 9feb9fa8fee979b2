use crate::config::Settings;
use crate::ingest::error::{ProviderError, ProviderResult};
use crate::ingest::types::{DividendHistory, Quote};
use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::Instrument;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 1000;

const QUOTE_ENDPOINT: &str = "quote";
const DIVIDEND_HISTORY_ENDPOINT: &str = "dividend_history";

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_quote(&self, symbol: &str) -> ProviderResult<Quote>;
}

#[async_trait::async_trait]
pub trait DividendHistoryProvider: Send + Sync {
    async fn fetch_dividend_history(&self, symbol: &str) -> ProviderResult<DividendHistory>;
}

#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub timeout: Duration,
    /// Total attempts per request, including the first.
    pub retries: u32,
    /// Backoff before retry `n` is `backoff * 2^(n-1)`.
    pub backoff: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: DEFAULT_RETRIES,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

impl ProviderOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Some(n) = env_parse::<u64>("DATA_PROVIDER_TIMEOUT_SECS") {
            out.timeout = Duration::from_secs(n);
        }
        if let Some(n) = env_parse::<u32>("DATA_PROVIDER_RETRIES") {
            out.retries = n.max(1);
        }

        out
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

/// HTTP JSON client for an Alpha Vantage style quote and dividend history API.
///
/// Requests run inside the injected `span`, so callers decide where provider logs go.
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retries: u32,
    backoff: Duration,
    span: tracing::Span,
}

impl AlphaVantageClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_data_provider_api_key()?.to_string();
        Self::new(
            &settings.data_provider_base_url,
            api_key,
            ProviderOptions::from_env(),
        )
    }

    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        opts: ProviderOptions,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(opts.timeout)
            .build()
            .context("failed to build data provider http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            retries: opts.retries.max(1),
            backoff: opts.backoff,
            span: tracing::info_span!("data_provider", provider = "alpha_vantage"),
        })
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    fn url(&self, endpoint: &str, symbol: &str) -> String {
        format!("{}/{}/{}", self.base_url, endpoint, symbol)
    }

    async fn get_json_once(&self, endpoint: &str, symbol: &str) -> ProviderResult<Value> {
        let res = self
            .http
            .get(self.url(endpoint, symbol))
            .query(&[("symbol", symbol), ("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            return Err(match status {
                StatusCode::NOT_FOUND => ProviderError::NotFound(symbol.to_string()),
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(format!("HTTP {status}")),
                _ => ProviderError::Unavailable(format!("HTTP {status}: {}", truncate(&text))),
            });
        }

        let raw_json = serde_json::from_str::<Value>(&text).map_err(|err| {
            ProviderError::InvalidResponse(format!("{err}: {}", truncate(&text)))
        })?;
        check_body_signals(&raw_json, symbol)?;
        Ok(raw_json)
    }

    async fn get_json(&self, endpoint: &str, symbol: &str) -> ProviderResult<Value> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_json_once(endpoint, symbol).await {
                Ok(v) => {
                    tracing::debug!(endpoint, symbol, attempt, "data provider fetch ok");
                    return Ok(v);
                }
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = self.backoff * (1 << (attempt - 1));
                    tracing::warn!(
                        endpoint,
                        symbol,
                        attempt,
                        ?backoff,
                        error = %err,
                        "data provider fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for AlphaVantageClient {
    fn provider_name(&self) -> &'static str {
        "alpha_vantage"
    }

    async fn fetch_quote(&self, symbol: &str) -> ProviderResult<Quote> {
        let raw = self
            .get_json(QUOTE_ENDPOINT, symbol)
            .instrument(self.span.clone())
            .await?;
        let mut quote = serde_json::from_value::<Quote>(raw)
            .map_err(|err| ProviderError::InvalidResponse(format!("quote: {err}")))?;
        if quote.symbol.trim().is_empty() {
            quote.symbol = symbol.to_string();
        }
        Ok(quote)
    }
}

#[async_trait::async_trait]
impl DividendHistoryProvider for AlphaVantageClient {
    async fn fetch_dividend_history(&self, symbol: &str) -> ProviderResult<DividendHistory> {
        let raw = self
            .get_json(DIVIDEND_HISTORY_ENDPOINT, symbol)
            .instrument(self.span.clone())
            .await?;
        let mut history = serde_json::from_value::<DividendHistory>(raw)
            .map_err(|err| ProviderError::InvalidResponse(format!("dividend history: {err}")))?;
        if history.symbol.trim().is_empty() {
            history.symbol = symbol.to_string();
        }
        Ok(history)
    }
}

/// Alpha Vantage reports several failures with HTTP 200 and a marker key.
fn check_body_signals(v: &Value, symbol: &str) -> ProviderResult<()> {
    let Some(obj) = v.as_object() else {
        return Err(ProviderError::InvalidResponse(
            "expected a JSON object".to_string(),
        ));
    };

    if obj.is_empty() {
        return Err(ProviderError::NotFound(symbol.to_string()));
    }
    if let Some(msg) = obj.get("Error Message") {
        return Err(ProviderError::NotFound(format!("{symbol}: {msg}")));
    }
    if let Some(msg) = obj.get("Note").or_else(|| obj.get("Information")) {
        return Err(ProviderError::RateLimited(msg.to_string()));
    }
    Ok(())
}

fn truncate(s: &str) -> &str {
    const MAX: usize = 200;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
