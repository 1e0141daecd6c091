use super::ui;
use crate::core::dispatcher::Dispatcher;
use crate::core::metrics;
use crate::core::provider::{ProviderId, Timeframe};
use crate::core::request::{Action, Field};
use crate::core::series::PriceHistory;
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, CellAlignment, Table};
use tracing::warn;

pub async fn run(
    dispatcher: &Dispatcher,
    symbol: &str,
    timeframe: Timeframe,
    today: NaiveDate,
) -> Result<()> {
    let pb = ui::new_progress_bar(1, true);
    pb.set_message(format!("Fetching {timeframe} history for {symbol}..."));
    let resolved = dispatcher
        .resolve_over(Action::Compare, symbol, Some(Field::HistoricalProfit), timeframe)
        .await;
    pb.finish_and_clear();

    let resolved = match resolved {
        Ok(resolved) => resolved,
        Err(err) => match ui::unavailable_message(symbol, &err) {
            Some(message) => {
                warn!(error = %err, "History unavailable");
                println!("{message}");
                return Ok(());
            }
            None => return Err(err.into()),
        },
    };
    let provider = resolved.provider;
    let Some(history) = resolved.payload.into_history().filter(|h| !h.series.is_empty())
    else {
        println!("No results found for {symbol}.");
        return Ok(());
    };

    let title = match &history.name {
        Some(name) => format!("{symbol} ({name})"),
        None => symbol.to_string(),
    };
    println!("\n{}", ui::style_text(&title, ui::StyleType::Title));
    println!("{}", summary_table(&history, provider, timeframe, today));

    let yearly = metrics::annual_returns(&history.series);
    if !yearly.is_empty() {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Year"), ui::header_cell("Return")]);
        for (year, ret) in yearly.iter().rev() {
            table.add_row(vec![ui::label_cell(&year.to_string()), ui::change_cell(*ret)]);
        }
        println!("{table}");
    }
    Ok(())
}

fn summary_table(
    history: &PriceHistory,
    provider: ProviderId,
    timeframe: Timeframe,
    today: NaiveDate,
) -> Table {
    let series = &history.series;
    let currency = history.currency.as_deref().unwrap_or("");
    let price = |value: f64| format!("{value:.2} {currency}").trim_end().to_string();
    let right = |text: String| Cell::new(text).set_alignment(CellAlignment::Right);

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);

    table.add_row(vec![ui::label_cell("Source"), Cell::new(provider.as_str())]);
    table.add_row(vec![ui::label_cell("Range"), Cell::new(timeframe.to_string())]);
    table.add_row(vec![
        ui::label_cell("Data points"),
        right(series.len().to_string()),
    ]);
    if let (Some((first_date, first)), Some((last_date, last))) = (series.first(), series.last()) {
        table.add_row(vec![
            ui::label_cell("First close"),
            right(format!("{} on {first_date}", price(first))),
        ]);
        table.add_row(vec![
            ui::label_cell("Last close"),
            right(format!("{} on {last_date}", price(last))),
        ]);
    }

    let high = series.prices().iter().copied().reduce(f64::max);
    let low = series.prices().iter().copied().reduce(f64::min);
    table.add_row(vec![
        ui::label_cell("High"),
        ui::format_optional_cell(high, price),
    ]);
    table.add_row(vec![
        ui::label_cell("Low"),
        ui::format_optional_cell(low, price),
    ]);

    table.add_row(vec![
        ui::label_cell("Total return"),
        ui::optional_change_cell(metrics::total_return(series), false),
    ]);
    table.add_row(vec![
        ui::label_cell("CAGR"),
        ui::optional_change_cell(metrics::cagr(series), false),
    ]);
    table.add_row(vec![
        ui::label_cell("1Y growth"),
        ui::optional_change_cell(metrics::growth_last_year(series, today), false),
    ]);
    table.add_row(vec![
        ui::label_cell("5Y CAGR"),
        ui::optional_change_cell(metrics::cagr_5y(series, today), false),
    ]);
    table.add_row(vec![
        ui::label_cell("Volatility"),
        ui::format_optional_cell(metrics::trailing_volatility(series), ui::format_percent),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::RawSeries;

    #[test]
    fn test_summary_table_reports_range_and_extremes() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        let history = PriceHistory {
            name: Some("Vanguard Total Stock Market ETF".to_string()),
            currency: Some("USD".to_string()),
            series: RawSeries::new(
                vec![d(2023, 6, 30), d(2023, 12, 29), d(2024, 6, 28)],
                vec![200.0, 237.5, 250.0],
            )
            .unwrap(),
        };

        let table = summary_table(&history, ProviderId::Yahoo, Timeframe::OneYear, d(2024, 6, 30));
        let rendered = table.to_string();

        assert!(rendered.contains("yahoo"));
        assert!(rendered.contains("250.00 USD on 2024-06-28"));
        assert!(rendered.contains("200.00 USD"));
        // 250 / 200 - 1
        assert!(rendered.contains("25.00%"));
    }
}
