//! Rule-based dividend growth screen.
//!
//! Inclusion is decided only by [`is_undervalued`] and [`has_growth_potential`].
//! [`calculate_score`] orders the survivors and never gates them.

use crate::domain::recommendation::{Recommendation, Signal};
use crate::domain::stock::StockRecord;
use std::collections::BTreeMap;

/// P/E must be strictly below this.
pub const MAX_PE_RATIO: f64 = 15.0;
/// Dividend yield (percent) must be strictly above this.
pub const MIN_DIVIDEND_YIELD: f64 = 2.0;
/// Dividend growth rate (percent) must be strictly above this.
pub const MIN_DIVIDEND_GROWTH_RATE: f64 = 5.0;

const EARNINGS_YIELD_WEIGHT: f64 = 0.4;
const DIVIDEND_YIELD_WEIGHT: f64 = 0.3;
const DIVIDEND_GROWTH_WEIGHT: f64 = 0.3;

/// Screens every record and emits a `BUY` for each one passing both predicates.
///
/// Output follows the mapping's iteration order (ascending symbol). Use [`rank`] for
/// score order.
pub fn screen(records: &BTreeMap<String, StockRecord>) -> Vec<Recommendation> {
    let mut out = Vec::new();
    for (symbol, record) in records {
        if is_undervalued(record) && has_growth_potential(record) {
            out.push(Recommendation {
                symbol: symbol.clone(),
                recommendation: Signal::Buy,
                score: calculate_score(record),
            });
        }
    }

    tracing::debug!(
        screened = records.len(),
        recommended = out.len(),
        "screen complete"
    );
    out
}

pub fn is_undervalued(record: &StockRecord) -> bool {
    record.effective_pe_ratio() < MAX_PE_RATIO
        && record.effective_dividend_yield() > MIN_DIVIDEND_YIELD
}

pub fn has_growth_potential(record: &StockRecord) -> bool {
    record.effective_dividend_growth_rate() > MIN_DIVIDEND_GROWTH_RATE
}

/// `0.4 * earnings_yield + 0.3 * dividend_yield + 0.3 * dividend_growth_rate`, all in percent,
/// rounded to 4 decimals when that stays finite.
///
/// Earnings yield is `100 / max(pe, 1)`, so P/E below 1 is capped at 100%. A missing or
/// negative P/E contributes nothing. Over non-negative P/E the score is non-increasing in P/E;
/// it is non-decreasing in yield and growth.
pub fn calculate_score(record: &StockRecord) -> f64 {
    let raw = EARNINGS_YIELD_WEIGHT * earnings_yield_pct(record.effective_pe_ratio())
        + DIVIDEND_YIELD_WEIGHT * record.effective_dividend_yield()
        + DIVIDEND_GROWTH_WEIGHT * record.effective_dividend_growth_rate();

    let scaled = raw * 10_000.0;
    if scaled.is_finite() {
        scaled.round() / 10_000.0
    } else if raw.is_nan() {
        0.0
    } else {
        raw.clamp(f64::MIN, f64::MAX)
    }
}

fn earnings_yield_pct(pe: f64) -> f64 {
    if pe.is_nan() || pe < 0.0 {
        return 0.0;
    }
    100.0 / pe.max(1.0)
}

/// Score descending, ties by symbol ascending.
pub fn rank(mut recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    recommendations.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pe: f64, yld: f64, growth: f64) -> StockRecord {
        StockRecord::new("T")
            .with_pe_ratio(pe)
            .with_dividend_yield(yld)
            .with_dividend_growth_rate(growth)
    }

    fn universe(items: &[(&str, StockRecord)]) -> BTreeMap<String, StockRecord> {
        items
            .iter()
            .map(|(s, r)| (s.to_string(), r.clone()))
            .collect()
    }

    #[test]
    fn undervalued_requires_strict_thresholds() {
        assert!(is_undervalued(&rec(14.99, 2.01, 0.0)));
        assert!(!is_undervalued(&rec(15.0, 3.0, 0.0)));
        assert!(!is_undervalued(&rec(20.0, 3.0, 0.0)));
        assert!(!is_undervalued(&rec(10.0, 2.0, 0.0)));
        assert!(!is_undervalued(&rec(10.0, 1.0, 0.0)));
    }

    #[test]
    fn undervalued_excludes_missing_fields() {
        assert!(!is_undervalued(&StockRecord::new("X").with_dividend_yield(5.0)));
        assert!(!is_undervalued(&StockRecord::new("X").with_pe_ratio(5.0)));
    }

    #[test]
    fn growth_requires_rate_above_five() {
        assert!(has_growth_potential(&rec(0.0, 0.0, 5.01)));
        assert!(!has_growth_potential(&rec(0.0, 0.0, 5.0)));
        assert!(!has_growth_potential(&rec(0.0, 0.0, -3.0)));
        assert!(!has_growth_potential(&StockRecord::new("X")));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(screen(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn qualifying_record_yields_buy() {
        let out = screen(&universe(&[("A", rec(10.0, 3.0, 6.0))]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "A");
        assert_eq!(out[0].recommendation, Signal::Buy);
        assert_eq!(out[0].score, calculate_score(&rec(10.0, 3.0, 6.0)));
    }

    #[test]
    fn high_pe_is_excluded() {
        assert!(screen(&universe(&[("B", rec(20.0, 3.0, 6.0))])).is_empty());
    }

    #[test]
    fn all_fields_missing_is_excluded() {
        assert!(screen(&universe(&[("C", StockRecord::default())])).is_empty());
    }

    #[test]
    fn screen_is_idempotent_and_does_not_touch_input() {
        let input = universe(&[
            ("KO", rec(12.0, 3.1, 6.5)),
            ("PEP", rec(14.0, 2.8, 7.0)),
            ("T", rec(9.0, 6.5, 0.5)),
        ]);
        let before = input.clone();
        let a = screen(&input);
        let b = screen(&input);
        assert_eq!(a, b);
        assert_eq!(input, before);
        assert_eq!(
            a.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>(),
            vec!["KO", "PEP"]
        );
    }

    #[test]
    fn insertion_order_does_not_change_qualifying_set() {
        let items = [
            ("ZZZ", rec(8.0, 4.0, 9.0)),
            ("AAA", rec(30.0, 4.0, 9.0)),
            ("MMM", rec(11.0, 2.5, 5.5)),
        ];
        let forward = screen(&universe(&items));
        let mut reversed_items = items.to_vec();
        reversed_items.reverse();
        let backward = screen(&universe(&reversed_items));

        let mut f: Vec<_> = forward.iter().map(|r| r.symbol.clone()).collect();
        let mut b: Vec<_> = backward.iter().map(|r| r.symbol.clone()).collect();
        f.sort();
        b.sort();
        assert_eq!(f, vec!["MMM".to_string(), "ZZZ".to_string()]);
        assert_eq!(f, b);
    }

    #[test]
    fn emitted_symbol_comes_from_mapping_key() {
        let record = rec(10.0, 3.0, 6.0);
        let out = screen(&universe(&[("KEY", record)]));
        assert_eq!(out[0].symbol, "KEY");
    }

    #[test]
    fn score_is_monotone_in_each_input() {
        let base = calculate_score(&rec(10.0, 3.0, 6.0));
        assert!(calculate_score(&rec(10.0, 4.0, 6.0)) > base);
        assert!(calculate_score(&rec(10.0, 3.0, 8.0)) > base);
        assert!(calculate_score(&rec(8.0, 3.0, 6.0)) > base);
        assert!(calculate_score(&rec(12.0, 3.0, 6.0)) < base);
        assert!(calculate_score(&rec(0.5, 3.0, 6.0)) >= calculate_score(&rec(1.0, 3.0, 6.0)));
    }

    #[test]
    fn score_handles_missing_pe() {
        let missing = StockRecord::new("X")
            .with_dividend_yield(3.0)
            .with_dividend_growth_rate(6.0);
        assert!(calculate_score(&missing).is_finite());
        assert!(calculate_score(&missing) < calculate_score(&rec(50.0, 3.0, 6.0)));
    }

    #[test]
    fn score_stays_finite_for_huge_inputs() {
        let out = calculate_score(&rec(10.0, 1e308, 1e308));
        assert!(out.is_finite());
        assert!(out > 1e307);

        let json = serde_json::to_value(Recommendation {
            symbol: "X".to_string(),
            recommendation: Signal::Buy,
            score: out,
        })
        .unwrap();
        assert!(json["score"].is_f64());

        let inf = StockRecord::new("X").with_dividend_yield(f64::INFINITY);
        assert_eq!(calculate_score(&inf), f64::MAX);
    }

    #[test]
    fn negative_pe_scores_like_missing_pe() {
        let missing = StockRecord::new("X")
            .with_dividend_yield(3.0)
            .with_dividend_growth_rate(6.0);
        assert_eq!(calculate_score(&rec(-1.0, 3.0, 6.0)), calculate_score(&missing));
    }

    #[test]
    fn rank_orders_by_score_then_symbol() {
        let mk = |s: &str, score: f64| Recommendation {
            symbol: s.to_string(),
            recommendation: Signal::Buy,
            score,
        };
        let ranked = rank(vec![mk("B", 1.0), mk("C", 3.0), mk("A", 1.0)]);
        let symbols: Vec<_> = ranked.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["C", "A", "B"]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn pe_at_or_above_limit_is_never_undervalued(
                pe in 15.0f64..1e9,
                yld in -100.0f64..1e3,
                growth in -100.0f64..1e3,
            ) {
                prop_assert!(!is_undervalued(&rec(pe, yld, growth)));
            }

            #[test]
            fn yield_at_or_below_floor_is_never_undervalued(
                pe in 0.0f64..1e9,
                yld in -100.0f64..=2.0,
                growth in -100.0f64..1e3,
            ) {
                prop_assert!(!is_undervalued(&rec(pe, yld, growth)));
            }

            #[test]
            fn growth_at_or_below_floor_has_no_potential(growth in -1e3f64..=5.0) {
                prop_assert!(!has_growth_potential(&rec(10.0, 3.0, growth)));
            }

            #[test]
            fn score_is_monotone(
                pe in 0.0f64..1e4,
                yld in -1e3f64..1e3,
                growth in -1e3f64..1e3,
                delta in 0.0f64..1e3,
            ) {
                let base = calculate_score(&rec(pe, yld, growth));
                prop_assert!(calculate_score(&rec(pe, yld + delta, growth)) >= base);
                prop_assert!(calculate_score(&rec(pe, yld, growth + delta)) >= base);
                prop_assert!(calculate_score(&rec(pe + delta, yld, growth)) <= base);
            }
        }
    }
}
