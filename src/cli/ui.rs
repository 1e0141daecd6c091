use crate::core::error::ResolveError;
use crate::core::metrics::StarRating;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Label,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Label => style(text).bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Bold cell naming a table row.
pub fn label_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

/// Formats an `Option<T>` into a `Cell`. `None` is displayed as "N/A".
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(
        Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
        |v| Cell::new(format_fn(v)).set_alignment(CellAlignment::Right),
    )
}

/// Formats a fraction as a percentage, `0.1234` as `12.34%`.
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Creates a cell for a fractional change, green when non-negative.
pub fn change_cell(change: f64) -> Cell {
    let color = if change >= 0.0 { Color::Green } else { Color::Red };
    Cell::new(format_percent(change))
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

/// Change cell, or "N/A" in red when the value failed to load.
pub fn optional_change_cell(change: Option<f64>, has_error: bool) -> Cell {
    change.map_or_else(|| na_cell(has_error), change_cell)
}

/// Creates a cell for "N/A" values, with error-specific styling.
pub fn na_cell(has_error: bool) -> Cell {
    let color = if has_error {
        Color::Red
    } else {
        Color::DarkGrey
    };
    Cell::new("N/A").fg(color).set_alignment(CellAlignment::Right)
}

pub fn stars_cell(rating: StarRating) -> Cell {
    Cell::new(rating.to_string())
        .fg(Color::Yellow)
        .set_alignment(CellAlignment::Center)
}

/// Creates a new `indicatif::ProgressBar` with standard styling.
pub fn new_progress_bar(len: u64, with_message: bool) -> ProgressBar {
    let template = if with_message {
        "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})"
    } else {
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})"
    };

    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Message shown when no provider could answer for `subject`. Configuration
/// defects get `None` and stay fatal.
pub fn unavailable_message(subject: &str, err: &ResolveError) -> Option<String> {
    if err.is_configuration() {
        return None;
    }
    Some(format!(
        "{} {}",
        style_text(
            &format!("No provider could answer for '{subject}'; try another source."),
            StyleType::Error
        ),
        style_text(&format!("({err})"), StyleType::Subtle)
    ))
}

/// Prints a separator line matching the terminal width.
pub fn print_separator() {
    let term_width = console::Term::stdout()
        .size_checked()
        .map(|(_, w)| w as usize)
        .unwrap_or(80);
    println!("\n{}", "─".repeat(term_width));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ProviderError;
    use crate::core::provider::ProviderId;

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.1234), "12.34%");
        assert_eq!(format_percent(-0.05), "-5.00%");
        assert_eq!(format_percent(0.0), "0.00%");
    }

    #[test]
    fn test_optional_cells_render_na() {
        let mut table = new_styled_table();
        table.add_row(vec![
            optional_change_cell(None, true),
            format_optional_cell(None::<f64>, |v| v.to_string()),
            optional_change_cell(Some(0.5), false),
        ]);
        let rendered = table.to_string();
        assert_eq!(rendered.matches("N/A").count(), 2);
        assert!(rendered.contains("50.00%"));
    }

    #[test]
    fn test_unavailable_message_only_for_provider_failures() {
        let cause = ProviderError::Rejected {
            provider: ProviderId::Eodhd,
            symbol: "ZZQQXX".to_string(),
            message: "no API key configured".to_string(),
        };
        let unavailable = ResolveError::ProviderUnavailable {
            action: "search".to_string(),
            field: None,
            source: cause.clone(),
        };
        let message = unavailable_message("zzqqxx", &unavailable).unwrap();
        assert!(message.contains("try another source"));
        assert!(message.contains("no API key configured"));

        let no_backup = ResolveError::NoBackup {
            action: "compare".to_string(),
            field: Some("historicalProfit".to_string()),
            cause,
        };
        assert!(unavailable_message("VTI", &no_backup).is_some());

        let configuration = ResolveError::Configuration {
            action: "search".to_string(),
            field: None,
        };
        assert_eq!(unavailable_message("VTI", &configuration), None);
    }
}
