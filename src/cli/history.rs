use super::ui;
use crate::core::CurrencyPair;
use crate::service::RateService;
use anyhow::{Result, bail};
use comfy_table::Cell;

/// `history`: most recent samples, optionally for one pair.
pub fn run(
    service: &RateService,
    from: Option<&str>,
    to: Option<&str>,
    limit: usize,
) -> Result<()> {
    let pair = match (from, to) {
        (Some(from), Some(to)) => Some(CurrencyPair::new(from, to)?),
        (None, None) => None,
        _ => bail!("Both --from and --to are required to filter history"),
    };

    let records = service.history(pair.as_ref(), limit)?;
    if records.is_empty() {
        println!("No history recorded yet. Run 'update-rates' to collect samples.");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Observed"),
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
        ui::header_cell("Source"),
    ]);
    for record in &records {
        table.add_row(vec![
            ui::timestamp_cell(record.timestamp),
            Cell::new(format!("{}→{}", record.from_currency, record.to_currency)),
            ui::rate_cell(record.rate),
            Cell::new(&record.source),
        ]);
    }
    println!("{table}");
    Ok(())
}
