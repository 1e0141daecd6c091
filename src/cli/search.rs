use super::ui;
use crate::core::aggregate;
use crate::core::dispatcher::Dispatcher;
use crate::core::payload::SearchHit;
use anyhow::Result;
use comfy_table::{Cell, Table};
use tracing::warn;

pub async fn run(dispatcher: &Dispatcher, query: &str) -> Result<()> {
    let pb = ui::new_progress_bar(1, true);
    pb.set_message(format!("Searching for '{query}'..."));
    let hits = aggregate::search(dispatcher, query).await;
    pb.finish_and_clear();

    let hits = match hits {
        Ok(hits) => hits,
        Err(err) => match ui::unavailable_message(query, &err) {
            Some(message) => {
                warn!(error = %err, "Search unavailable");
                println!("{message}");
                return Ok(());
            }
            None => return Err(err.into()),
        },
    };
    if hits.is_empty() {
        println!("No results found for '{query}'.");
        return Ok(());
    }

    println!(
        "\n{} {}",
        ui::style_text("Results for", ui::StyleType::Label),
        ui::style_text(query, ui::StyleType::Title)
    );
    println!("{}", hits_table(&hits));
    Ok(())
}

fn hits_table(hits: &[SearchHit]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Exchange"),
        ui::header_cell("Type"),
        ui::header_cell("Sector"),
    ]);

    let text = |value: &Option<String>| Cell::new(value.as_deref().unwrap_or("-"));
    for hit in hits {
        table.add_row(vec![
            ui::label_cell(&hit.symbol),
            text(&hit.name),
            text(&hit.exchange),
            text(&hit.kind),
            text(&hit.sector),
        ]);
    }
    table
}
