use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Current quote fields for one symbol.
///
/// Accepts both snake_case and Alpha Vantage style keys. Numbers may arrive as JSON numbers or
/// numeric strings; `"None"`, `"-"` and empty strings read as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default, alias = "Symbol")]
    pub symbol: String,
    #[serde(default, alias = "Price", deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, alias = "PERatio", deserialize_with = "lenient_f64")]
    pub pe_ratio: Option<f64>,
    /// Percent units.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub dividend_yield: Option<f64>,
    /// Fractional units (`0.031` for 3.1%), as Alpha Vantage reports it.
    #[serde(default, rename = "DividendYield", deserialize_with = "lenient_f64")]
    pub dividend_yield_fraction: Option<f64>,
}

impl Quote {
    /// Negative P/E means losses; report it as unknown rather than cheap.
    pub fn normalized_pe_ratio(&self) -> Option<f64> {
        self.pe_ratio.filter(|v| *v >= 0.0)
    }

    pub fn dividend_yield_pct(&self) -> Option<f64> {
        self.dividend_yield
            .or_else(|| self.dividend_yield_fraction.map(|f| f * 100.0))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DividendHistory {
    #[serde(default)]
    pub symbol: String,
    #[serde(default, alias = "data", alias = "dividends")]
    pub payments: Vec<DividendPayment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendPayment {
    /// Absent when the provider reports `"None"` or an unparseable date.
    #[serde(default, alias = "date", deserialize_with = "lenient_date")]
    pub ex_dividend_date: Option<NaiveDate>,
    #[serde(default, alias = "dividend", deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
}

impl DividendHistory {
    /// Compound annual growth of yearly dividend totals, in percent.
    ///
    /// Only complete calendar years before `as_of` and within `lookback_years` of the last one
    /// count. Needs at least two years with a positive total.
    pub fn growth_rate_pct(&self, as_of: NaiveDate, lookback_years: u32) -> Option<f64> {
        let last_year = as_of.year() - 1;
        let first_year = last_year - lookback_years as i32;

        let mut totals = BTreeMap::<i32, f64>::new();
        for p in &self.payments {
            let Some(date) = p.ex_dividend_date else {
                continue;
            };
            let year = date.year();
            if year < first_year || year > last_year {
                continue;
            }
            if let Some(amount) = p.amount.filter(|a| *a > 0.0) {
                *totals.entry(year).or_insert(0.0) += amount;
            }
        }

        let (&y0, &v0) = totals.iter().next()?;
        let (&y1, &v1) = totals.iter().next_back()?;
        if y1 <= y0 {
            return None;
        }

        let periods = (y1 - y0) as f64;
        Some(((v1 / v0).powf(1.0 / periods) - 1.0) * 100.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrString {
    Num(f64),
    Str(String),
}

fn lenient_f64<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumOrString>::deserialize(de)? {
        None => None,
        Some(NumOrString::Num(v)) => Some(v).filter(|v| v.is_finite()),
        Some(NumOrString::Str(s)) => parse_num(&s),
    })
}

fn lenient_date<'de, D>(de: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
}

pub(crate) fn parse_num(s: &str) -> Option<f64> {
    let t = s.trim().trim_end_matches('%').trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}
