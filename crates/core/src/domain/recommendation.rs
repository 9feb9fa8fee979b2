use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: String,
    pub recommendation: Signal,
    pub score: f64,
}

/// Result of one screening run over a fetched universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenReport {
    pub as_of_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub screened: usize,
    pub recommendations: Vec<Recommendation>,
    pub failures: Vec<FetchFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchFailure {
    pub symbol: String,
    /// `not_found`, `unavailable`, `rate_limited`, `timeout` or `invalid_response`.
    pub kind: String,
    pub detail: String,
}
