use super::ui::{self, StyleType};
use crate::core::rate::RateEntry;
use crate::core::{CurrencyPair, Freshness};
use crate::service::RateService;
use crate::store::rates::RateTable;
use anyhow::Result;
use comfy_table::Cell;

/// `show-rates`: cached rates, optionally narrowed to one currency or the top N.
pub fn run(service: &RateService, currency: Option<&str>, top: Option<usize>) -> Result<()> {
    let table = service.cached_entries()?;
    if table.is_empty() {
        println!("Local cache is empty. Run 'update-rates' to load data.");
        return Ok(());
    }

    let rows = filter_rates(table, currency, top);
    if rows.is_empty() {
        match currency {
            Some(code) => println!("No rates found for currency '{}'.", code.to_uppercase()),
            None => println!("No rates found."),
        }
        return Ok(());
    }

    let status = service.get_update_status()?;
    println!(
        "{} ({} rates, status {})",
        ui::style_text("Cached rates", StyleType::Title),
        rows.len(),
        status.status.to_string().to_uppercase()
    );
    if status.status == Freshness::Outdated {
        println!(
            "{}",
            ui::style_text(
                "Rates may be outdated. Consider running 'update-rates'",
                StyleType::Warning
            )
        );
    }

    let mut output = ui::new_styled_table();
    output.set_header(vec![
        ui::header_cell("From"),
        ui::header_cell("To"),
        ui::header_cell("Rate"),
        ui::header_cell("Source"),
        ui::header_cell("Updated"),
    ]);
    for (pair, entry) in &rows {
        output.add_row(vec![
            Cell::new(pair.from()),
            Cell::new(pair.to()),
            ui::rate_cell(entry.rate),
            Cell::new(&entry.source),
            ui::timestamp_cell(entry.updated_at),
        ]);
    }
    println!("{output}");
    Ok(())
}

/// Rows sorted by pair, or by rate descending when `top` is given.
fn filter_rates(
    table: RateTable,
    currency: Option<&str>,
    top: Option<usize>,
) -> Vec<(CurrencyPair, RateEntry)> {
    let mut rows: Vec<_> = table
        .into_iter()
        .filter(|(pair, _)| currency.is_none_or(|code| pair.involves(code)))
        .collect();

    if let Some(n) = top.filter(|n| *n > 0) {
        rows.sort_by(|a, b| b.1.rate.total_cmp(&a.1.rate));
        rows.truncate(n);
    }
    rows
}
