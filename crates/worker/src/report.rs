use anyhow::Context;
use divgrowth_core::domain::recommendation::ScreenReport;
use divgrowth_core::domain::stock::StockRecord;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Table,
    Json,
}

/// Parses a JSON object of `symbol -> record`. The key names the record when it has no
/// `symbol` of its own.
pub fn parse_records(text: &str) -> anyhow::Result<BTreeMap<String, StockRecord>> {
    let raw = serde_json::from_str::<BTreeMap<String, StockRecord>>(text)
        .context("records file must be a JSON object of symbol -> record")?;

    let mut out = BTreeMap::new();
    for (key, mut record) in raw {
        let symbol = key.trim().to_string();
        anyhow::ensure!(!symbol.is_empty(), "record keys must be non-empty symbols");
        if record.symbol.trim().is_empty() {
            record.symbol = symbol.clone();
        }
        out.insert(symbol, record);
    }
    Ok(out)
}

pub fn render(report: &ScreenReport, format: Format) -> anyhow::Result<String> {
    match format {
        Format::Json => serde_json::to_string_pretty(report).context("serialize report failed"),
        Format::Table => Ok(render_table(report)),
    }
}

fn render_table(report: &ScreenReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "as of {} | screened {} | recommended {} | failed {}",
        report.as_of_date,
        report.screened,
        report.recommendations.len(),
        report.failures.len()
    );

    if report.recommendations.is_empty() {
        out.push_str("no stocks passed the screen\n");
    } else {
        let _ = writeln!(out, "{:>4}  {:<10} {:<6} {:>10}", "rank", "symbol", "signal", "score");
        for (idx, rec) in report.recommendations.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>4}  {:<10} {:<6} {:>10.4}",
                idx + 1,
                rec.symbol,
                rec.recommendation.as_str(),
                rec.score
            );
        }
    }

    for f in &report.failures {
        let _ = writeln!(out, "failed {} ({}): {}", f.symbol, f.kind, f.detail);
    }

    out.trim_end().to_string()
}
