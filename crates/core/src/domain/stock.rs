use serde::{Deserialize, Serialize};

/// One snapshot of fundamentals for a single ticker.
///
/// Every numeric field is optional. Missing values are never an error: the `effective_*`
/// accessors substitute a default that biases the screen toward exclusion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    /// Percent units, `2.5` means 2.5%.
    #[serde(default)]
    pub dividend_yield: Option<f64>,
    /// Year-over-year dividend growth, percent units.
    #[serde(default)]
    pub dividend_growth_rate: Option<f64>,
}

impl StockRecord {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn with_pe_ratio(mut self, v: f64) -> Self {
        self.pe_ratio = Some(v);
        self
    }

    pub fn with_dividend_yield(mut self, v: f64) -> Self {
        self.dividend_yield = Some(v);
        self
    }

    pub fn with_dividend_growth_rate(mut self, v: f64) -> Self {
        self.dividend_growth_rate = Some(v);
        self
    }

    /// Missing P/E reads as infinitely overvalued.
    pub fn effective_pe_ratio(&self) -> f64 {
        finite(self.pe_ratio).unwrap_or(f64::INFINITY)
    }

    pub fn effective_dividend_yield(&self) -> f64 {
        finite(self.dividend_yield).unwrap_or(0.0)
    }

    pub fn effective_dividend_growth_rate(&self) -> f64 {
        finite(self.dividend_growth_rate).unwrap_or(0.0)
    }
}

// NaN compares false against every threshold, which would make the defaults meaningless.
fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| !x.is_nan())
}
