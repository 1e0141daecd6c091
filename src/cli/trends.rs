use super::ui;
use crate::core::aggregate;
use crate::core::dispatcher::Dispatcher;
use crate::core::payload::{Mover, TrendList};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Color, Table};
use futures::future::join_all;
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;

/// Column a mover table can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendSort {
    Price,
    Change,
    Percent,
}

impl TrendSort {
    pub const fn as_str(self) -> &'static str {
        match self {
            TrendSort::Price => "price",
            TrendSort::Change => "change",
            TrendSort::Percent => "percent",
        }
    }

    fn value(self, mover: &Mover) -> Option<f64> {
        match self {
            TrendSort::Price => mover.price,
            TrendSort::Change => mover.change,
            TrendSort::Percent => mover.change_percent,
        }
    }
}

impl Display for TrendSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendSort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price" => Ok(TrendSort::Price),
            "change" | "changes" => Ok(TrendSort::Change),
            "percent" | "changespercentage" => Ok(TrendSort::Percent),
            _ => anyhow::bail!("Unknown sort column: {s} (expected price, change or percent)"),
        }
    }
}

pub async fn run(
    dispatcher: &Dispatcher,
    lists: &[TrendList],
    sort: Option<TrendSort>,
    ascending: bool,
) -> Result<()> {
    let pb = ui::new_progress_bar(lists.len() as u64, true);
    pb.set_message("Fetching market trends...");
    let progress = &pb;
    let results = join_all(lists.iter().map(|&list| async move {
        let movers = aggregate::trends(dispatcher, list).await;
        progress.inc(1);
        (list, movers)
    }))
    .await;
    pb.finish_and_clear();

    for (list, movers) in results {
        println!("\n{}", ui::style_text(list.title(), ui::StyleType::Title));
        let mut movers = match movers {
            Ok(movers) => movers,
            Err(err) => match ui::unavailable_message(list.as_str(), &err) {
                Some(message) => {
                    warn!(error = %err, list = %list, "Trends unavailable");
                    println!("{message}");
                    continue;
                }
                None => return Err(err.into()),
            },
        };

        if movers.is_empty() {
            println!("No movers reported.");
            continue;
        }
        if let Some(key) = sort {
            sort_movers(&mut movers, key, ascending);
        }
        println!("{}", movers_table(&movers));
    }
    Ok(())
}

/// Orders `movers` by `key`. Movers without a value go last either way.
pub fn sort_movers(movers: &mut [Mover], key: TrendSort, ascending: bool) {
    movers.sort_by(|a, b| match (key.value(a), key.value(b)) {
        (Some(x), Some(y)) if ascending => x.total_cmp(&y),
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn movers_table(movers: &[Mover]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Price"),
        ui::header_cell("Change"),
        ui::header_cell("Change %"),
    ]);

    for mover in movers {
        table.add_row(vec![
            ui::label_cell(&mover.symbol),
            Cell::new(mover.name.as_deref().unwrap_or("-")),
            ui::format_optional_cell(mover.price, |p| format!("{p:.2}")),
            signed_cell(mover.change, |v| format!("{v:+.2}")),
            signed_cell(mover.change_percent, |v| format!("{v:+.2}%")),
        ]);
    }
    table
}

fn signed_cell(value: Option<f64>, format_fn: impl Fn(f64) -> String) -> Cell {
    match value {
        Some(v) => {
            let color = if v >= 0.0 { Color::Green } else { Color::Red };
            Cell::new(format_fn(v))
                .fg(color)
                .set_alignment(CellAlignment::Right)
        }
        None => ui::na_cell(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mover(symbol: &str, price: Option<f64>, change_percent: Option<f64>) -> Mover {
        Mover {
            symbol: symbol.to_string(),
            price,
            change_percent,
            ..Default::default()
        }
    }

    fn symbols(movers: &[Mover]) -> Vec<&str> {
        movers.iter().map(|m| m.symbol.as_str()).collect()
    }

    #[test]
    fn test_sort_movers_both_directions() {
        let mut movers = vec![
            mover("AMD", Some(160.2), Some(-2.5)),
            mover("NVDA", Some(123.5), Some(4.1)),
            mover("UNKN", None, None),
            mover("TSLA", Some(182.5), Some(0.3)),
        ];

        sort_movers(&mut movers, TrendSort::Price, true);
        assert_eq!(symbols(&movers), vec!["NVDA", "AMD", "TSLA", "UNKN"]);

        sort_movers(&mut movers, TrendSort::Percent, false);
        assert_eq!(symbols(&movers), vec!["NVDA", "TSLA", "AMD", "UNKN"]);

        sort_movers(&mut movers, TrendSort::Change, true);
        assert_eq!(symbols(&movers), vec!["NVDA", "TSLA", "AMD", "UNKN"]);
    }

    #[test]
    fn test_sort_names() {
        assert_eq!("price".parse::<TrendSort>().unwrap(), TrendSort::Price);
        assert_eq!("changesPercentage".parse::<TrendSort>().unwrap(), TrendSort::Percent);
        assert!("volume".parse::<TrendSort>().is_err());
    }

    #[test]
    fn test_movers_table_signs_changes() {
        let movers = vec![Mover {
            symbol: "TSLA".to_string(),
            name: Some("Tesla Inc".to_string()),
            price: Some(182.47),
            change: Some(-3.12),
            change_percent: Some(-1.68),
        }];

        let rendered = movers_table(&movers).to_string();
        assert!(rendered.contains("182.47"));
        assert!(rendered.contains("-3.12"));
        assert!(rendered.contains("-1.68%"));

        let rendered = movers_table(&[mover("NVDA", None, Some(4.1))]).to_string();
        assert!(rendered.contains("+4.10%"));
        assert!(rendered.contains("N/A"));
    }
}
