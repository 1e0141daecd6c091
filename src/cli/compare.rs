use super::ui;
use crate::core::aggregate::{self, FundRecord, FundReport};
use crate::core::dispatcher::Dispatcher;
use crate::core::payload::format_large_number;
use crate::core::request::Field;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{Cell, CellAlignment, Table};
use std::collections::BTreeSet;

pub async fn run(
    dispatcher: &Dispatcher,
    symbols: &[String],
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    if symbols.is_empty() {
        println!("No symbols to compare.");
        return Ok(());
    }

    let pb = ui::new_progress_bar(symbols.len() as u64, true);
    pb.set_message("Fetching fund data...");
    let reports =
        aggregate::compare_with_progress(dispatcher, symbols, today, &|| pb.inc(1)).await;
    pb.finish_and_clear();

    if json {
        let out = serde_json::to_string_pretty(&reports)
            .context("Failed to serialize comparison")?;
        println!("{out}");
        return Ok(());
    }

    if reports.iter().all(|r| r.sources.is_empty()) {
        println!("No results found for {}.", symbols.join(", "));
        display_failures(&reports);
        return Ok(());
    }

    println!("\n{}", ui::style_text("Fund comparison", ui::StyleType::Title));
    println!("{}", metrics_table(&reports));

    if let Some(table) = annual_returns_table(&reports) {
        println!("\n{}", ui::style_text("Annual returns", ui::StyleType::Title));
        println!("{table}");
    }

    display_failures(&reports);
    Ok(())
}

type CellFn = fn(&FundRecord) -> Option<Cell>;

/// Row label, the field backing it, and how to render a record's value.
const METRIC_ROWS: [(&str, Field, CellFn); 12] = [
    ("Name", Field::HistoricalProfit, |r| r.name.as_deref().map(Cell::new)),
    ("Category", Field::CategorySector, |r| {
        r.category.as_deref().map(Cell::new)
    }),
    ("Price", Field::HistoricalProfit, |r| {
        r.price.map(|p| {
            let currency = r.currency.as_deref().unwrap_or("");
            Cell::new(format!("{p:.2} {currency}").trim_end())
                .set_alignment(CellAlignment::Right)
        })
    }),
    ("Total return", Field::HistoricalProfit, |r| {
        r.total_return.map(ui::change_cell)
    }),
    ("1Y growth", Field::HistoricalProfit, |r| {
        r.growth_last_year.map(ui::change_cell)
    }),
    ("5Y CAGR", Field::HistoricalProfit, |r| r.cagr_5y.map(ui::change_cell)),
    ("Volatility", Field::AnnualVolatility, |r| {
        r.volatility
            .map(|v| Cell::new(ui::format_percent(v)).set_alignment(CellAlignment::Right))
    }),
    ("Expense ratio", Field::Commissions, |r| {
        r.commissions
            .as_ref()
            .and_then(|c| c.expense_ratio)
            .map(|v| Cell::new(ui::format_percent(v)).set_alignment(CellAlignment::Right))
    }),
    ("Total assets", Field::Commissions, |r| {
        r.commissions
            .as_ref()
            .and_then(|c| c.total_assets)
            .map(|v| Cell::new(format_large_number(v)).set_alignment(CellAlignment::Right))
    }),
    ("YTD return", Field::Commissions, |r| {
        r.commissions
            .as_ref()
            .and_then(|c| c.ytd_return)
            .map(ui::change_cell)
    }),
    ("Market cap", Field::MarketCap, |r| {
        r.market_cap
            .as_ref()
            .map(|m| Cell::new(&m.formatted).set_alignment(CellAlignment::Right))
    }),
    ("Rating", Field::AnnualVolatility, |r| Some(ui::stars_cell(r.rating))),
];

/// One column per symbol, one row per metric.
fn metrics_table(reports: &[FundReport]) -> Table {
    let mut table = ui::new_styled_table();

    let mut header = vec![ui::header_cell("Metric")];
    header.extend(reports.iter().map(|r| ui::header_cell(&r.record.symbol)));
    table.set_header(header);

    for (label, field, render) in METRIC_ROWS {
        let mut row = vec![ui::label_cell(label)];
        row.extend(reports.iter().map(|report| {
            render(&report.record)
                .unwrap_or_else(|| ui::na_cell(report.failures.contains_key(&field)))
        }));
        table.add_row(row);
    }
    table
}

/// Year rows across every symbol with annual returns, or `None` when no
/// symbol has any.
fn annual_returns_table(reports: &[FundReport]) -> Option<Table> {
    let years: BTreeSet<i32> = reports
        .iter()
        .filter_map(|r| r.annual_returns.as_ref())
        .flat_map(|returns| returns.keys().copied())
        .collect();
    if years.is_empty() {
        return None;
    }

    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Year")];
    header.extend(reports.iter().map(|r| ui::header_cell(&r.record.symbol)));
    table.set_header(header);

    for year in years.iter().rev() {
        let mut row = vec![ui::label_cell(&year.to_string())];
        row.extend(reports.iter().map(|report| {
            let value = report
                .annual_returns
                .as_ref()
                .and_then(|returns| returns.get(year).copied());
            ui::optional_change_cell(
                value,
                report.failures.contains_key(&Field::AnnualReturns),
            )
        }));
        table.add_row(row);
    }
    Some(table)
}

fn display_failures(reports: &[FundReport]) {
    let failed: Vec<&FundReport> = reports.iter().filter(|r| !r.is_complete()).collect();
    if failed.is_empty() {
        return;
    }

    println!("\n{}", ui::style_text("Unavailable data", ui::StyleType::Label));
    for report in failed {
        for (field, reason) in &report.failures {
            println!(
                "  {} {}: {}",
                ui::style_text(&report.record.symbol, ui::StyleType::Label),
                ui::style_text(field.label(), ui::StyleType::Subtle),
                ui::style_text(reason, ui::StyleType::Error)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::StarRating;
    use crate::core::payload::{AnnualReturns, Commissions, MarketCap};

    fn full_report() -> FundReport {
        FundReport {
            record: FundRecord {
                symbol: "VTI".to_string(),
                name: Some("Vanguard Total Stock Market ETF".to_string()),
                currency: Some("USD".to_string()),
                price: Some(261.2),
                category: Some("Large Blend".to_string()),
                volatility: Some(0.16),
                commissions: Some(Commissions {
                    expense_ratio: Some(0.0003),
                    total_assets: Some(4.12e11),
                    ..Default::default()
                }),
                market_cap: Some(MarketCap::new(4.12e11)),
                total_return: Some(0.25),
                growth_last_year: Some(0.12),
                cagr_5y: Some(0.08),
                rating: StarRating::rate(Some(0.25), Some(0.16)),
            },
            annual_returns: Some(AnnualReturns::from([(2022, -0.195), (2023, 0.26)])),
            ..Default::default()
        }
    }

    fn failed_report() -> FundReport {
        let mut report = FundReport {
            record: FundRecord {
                symbol: "ZZZZ".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        report
            .failures
            .insert(Field::HistoricalProfit, "yahoo has no data for ZZZZ".to_string());
        report
    }

    #[test]
    fn test_metrics_table_has_column_per_symbol() {
        let table = metrics_table(&[full_report(), failed_report()]);
        assert_eq!(table.row_count(), METRIC_ROWS.len());

        let rendered = table.to_string();
        assert!(rendered.contains("VTI"));
        assert!(rendered.contains("ZZZZ"));
        assert!(rendered.contains("0.03%"));
        assert!(rendered.contains("412.00B"));
        assert!(rendered.contains("N/A"));
    }

    #[test]
    fn test_annual_returns_table_rows_by_year() {
        let table = annual_returns_table(&[full_report(), failed_report()]).unwrap();
        assert_eq!(table.row_count(), 2);

        let rendered = table.to_string();
        assert!(rendered.contains("2023"));
        assert!(rendered.contains("-19.50%"));
        assert!(annual_returns_table(&[failed_report()]).is_none());
    }
}
