use crate::domain::recommendation::FetchFailure;
use crate::domain::stock::StockRecord;
use crate::ingest::error::{ProviderError, ProviderResult};
use crate::ingest::provider::{DividendHistoryProvider, MarketDataProvider};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UniverseOptions {
    /// Pause between symbols to stay under provider quotas.
    pub req_delay: Duration,

    /// Years of dividend history considered for the growth rate.
    pub dividend_lookback_years: u32,

    pub max_logged_failures: usize,
}

impl Default for UniverseOptions {
    fn default() -> Self {
        Self {
            req_delay: Duration::from_millis(250),
            dividend_lookback_years: 5,
            max_logged_failures: 10,
        }
    }
}

impl UniverseOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("DATA_PROVIDER_REQ_DELAY_MS") {
            if let Ok(n) = s.trim().parse::<u64>() {
                out.req_delay = Duration::from_millis(n);
            }
        }

        if let Ok(s) = std::env::var("DIVIDEND_LOOKBACK_YEARS") {
            if let Ok(n) = s.trim().parse::<u32>() {
                out.dividend_lookback_years = n.max(1);
            }
        }

        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub records: BTreeMap<String, StockRecord>,
    pub failures: Vec<FetchFailure>,
}

impl Universe {
    /// True when symbols were requested and none of them resolved.
    pub fn all_failed(&self) -> bool {
        self.records.is_empty() && !self.failures.is_empty()
    }
}

/// Trims, upper-cases and de-duplicates symbols, keeping first-seen order.
pub fn normalize_symbols(symbols: &[String]) -> anyhow::Result<Vec<String>> {
    anyhow::ensure!(!symbols.is_empty(), "at least one symbol is required");

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(symbols.len());
    for raw in symbols {
        let symbol = raw.trim().to_ascii_uppercase();
        anyhow::ensure!(!symbol.is_empty(), "symbol must be non-empty");
        if seen.insert(symbol.clone()) {
            out.push(symbol);
        }
    }
    Ok(out)
}

pub async fn fetch_universe<M, D>(
    market: &M,
    dividends: &D,
    symbols: &[String],
    as_of_date: NaiveDate,
    opts: &UniverseOptions,
) -> anyhow::Result<Universe>
where
    M: MarketDataProvider + ?Sized,
    D: DividendHistoryProvider + ?Sized,
{
    let symbols = normalize_symbols(symbols)?;
    let total = symbols.len();
    let mut out = Universe::default();

    for (idx, symbol) in symbols.into_iter().enumerate() {
        if idx != 0 && !opts.req_delay.is_zero() {
            tokio::time::sleep(opts.req_delay).await;
        }

        match fetch_stock_record(
            market,
            dividends,
            &symbol,
            as_of_date,
            opts.dividend_lookback_years,
        )
        .await
        {
            Ok(record) => {
                out.records.insert(symbol, record);
            }
            Err(err) => {
                if out.failures.len() < opts.max_logged_failures {
                    tracing::warn!(
                        idx,
                        %symbol,
                        failure_count = out.failures.len() + 1,
                        error = %err,
                        "provider fetch failed; skipping symbol"
                    );
                }
                out.failures.push(FetchFailure {
                    symbol,
                    kind: err.kind().to_string(),
                    detail: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        provider = market.provider_name(),
        total,
        records = out.records.len(),
        failures = out.failures.len(),
        %as_of_date,
        "universe fetch complete"
    );

    Ok(out)
}

/// Joins a quote with the dividend growth derived from history.
///
/// A symbol without dividend history is valid and simply carries no growth rate.
pub async fn fetch_stock_record<M, D>(
    market: &M,
    dividends: &D,
    symbol: &str,
    as_of_date: NaiveDate,
    lookback_years: u32,
) -> ProviderResult<StockRecord>
where
    M: MarketDataProvider + ?Sized,
    D: DividendHistoryProvider + ?Sized,
{
    let quote = market.fetch_quote(symbol).await?;

    let dividend_growth_rate = match dividends.fetch_dividend_history(symbol).await {
        Ok(history) => history.growth_rate_pct(as_of_date, lookback_years),
        Err(ProviderError::NotFound(_)) => None,
        Err(err) => return Err(err),
    };

    Ok(StockRecord {
        symbol: symbol.to_string(),
        pe_ratio: quote.normalized_pe_ratio(),
        dividend_yield: quote.dividend_yield_pct(),
        dividend_growth_rate,
    })
}
