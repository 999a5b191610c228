//! Plain-text output for the terminal.

use std::fmt::Write as _;

use marketlens_core::view::dashboard::{Direction, MarketRow, RecentAnalysisRow};
use marketlens_core::view::report::ReportView;

pub fn market_table(rows: &[MarketRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:<18} {:>12} {:>9} {:>8}",
        "SYMBOL", "NAME", "PRICE", "CHANGE", "VOLUME"
    );
    for row in rows {
        let arrow = match row.direction {
            Direction::Up => '+',
            Direction::Down => '-',
        };
        let _ = writeln!(
            out,
            "{:<10} {:<18} {:>12} {:>9} {:>8}",
            row.symbol,
            row.name,
            row.price,
            format!("{arrow}{}", row.change),
            row.volume
        );
    }
    out
}

pub fn recent_table(rows: &[RecentAnalysisRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:<32} {:<11} {:<6} {:>6}",
        "TYPE", "TITLE", "DATE", "REC", "CONF"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<10} {:<32} {:<11} {:<6} {:>6}",
            row.kind, row.title, row.date, row.recommendation, row.confidence
        );
    }
    out
}

pub fn report(view: &ReportView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.heading);
    let _ = writeln!(out, "{}", view.subtitle);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", view.summary);
    let _ = writeln!(out);

    let rec = &view.recommendation;
    let _ = write!(out, "Recommendation: {} ({})", rec.action, rec.timeframe);
    if let Some(target) = &rec.target_price {
        let _ = write!(out, ", target {target}");
    }
    let _ = writeln!(out, ", {}", rec.confidence_label);

    let _ = writeln!(out, "Trend: {}", view.trend);
    let _ = writeln!(out, "Support: {}", view.support_levels.join(", "));
    let _ = writeln!(out, "Resistance: {}", view.resistance_levels.join(", "));
    for ind in &view.indicators {
        let _ = writeln!(out, "  {:<16} {:<16} {}", ind.name, ind.value, ind.signal);
    }

    let sa = &view.sentiment;
    let _ = writeln!(out, "Sentiment: {} ({})", sa.overall, sa.score_label);
    for src in &sa.sources {
        let _ = writeln!(out, "  {:<16} {}", src.name, src.label);
    }
    if let Some(url) = &view.annotated_chart_url {
        let _ = writeln!(out, "Annotated chart: {url}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use marketlens_core::domain::market::{seed_market_items, seed_recent_analyses};
    use marketlens_core::domain::report::sample_report;
    use marketlens_core::domain::request::{AnalysisRequest, Timeframe};
    use marketlens_core::view::dashboard::{market_rows, recent_rows};

    #[test]
    fn market_table_marks_direction() {
        let out = market_table(&market_rows(&seed_market_items()));
        let tsla = out.lines().find(|l| l.starts_with("TSLA")).unwrap();
        assert!(tsla.contains("$242.68"));
        assert!(tsla.contains("-1.78%"));
        assert_eq!(out.lines().count(), 8);
    }

    #[test]
    fn recent_table_lists_seed_rows() {
        let out = recent_table(&recent_rows(&seed_recent_analyses()));
        assert!(out.contains("10/15/2023"));
        assert!(out.contains("BUY"));
        assert_eq!(out.lines().count(), 6);
    }

    #[test]
    fn report_text_includes_recommendation() {
        let req = AnalysisRequest::Ticker {
            ticker: "AAPL".to_string(),
            timeframe: Timeframe::Monthly,
        };
        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let view = ReportView::build(&req, &sample_report(&req), day, None);
        let out = report(&view);
        assert!(out.starts_with("AAPL Analysis\n"));
        assert!(out.contains("monthly timeframe"));
        assert!(out.contains("target $205, 82% confidence"));
        assert!(out.contains("Support: $170, $165, $158"));
    }
}
