use super::ui::{self, StyleType};
use crate::core::{UpdateReport, UpdateStatus};
use crate::service::RateService;
use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::Cell;

/// `update-rates`: one manual refresh cycle.
pub async fn run(service: &RateService, source: Option<&str>) -> Result<()> {
    let sources = source.map(|name| vec![name.to_lowercase()]);

    let spinner = ui::new_spinner("Updating rates...");
    let result = service.run_update(sources.as_deref()).await;
    spinner.finish_and_clear();

    print_report(&result?);
    Ok(())
}

fn print_report(report: &UpdateReport) {
    if report.success {
        println!("{}", ui::style_text("Update successful", StyleType::Value));
    } else {
        println!(
            "{}",
            ui::style_text("Update completed with errors", StyleType::Error)
        );
        for error in &report.errors {
            println!("  - {error}");
        }
    }

    let mut table = ui::new_styled_table();
    table.add_row(vec![
        ui::header_cell("Sources processed"),
        Cell::new(report.sources_processed.join(", ")),
    ]);
    table.add_row(vec![
        ui::header_cell("Total rates"),
        Cell::new(report.total_rates),
    ]);
    table.add_row(vec![
        ui::header_cell("Cache updated"),
        Cell::new(report.updated_rates),
    ]);
    table.add_row(vec![
        ui::header_cell("History saved"),
        Cell::new(report.historical_records),
    ]);
    table.add_row(vec![
        ui::header_cell("Completed"),
        ui::timestamp_cell(report.completed_at),
    ]);
    println!("{table}");
}

/// `status`: freshness of the cache as a whole.
pub fn status(service: &RateService) -> Result<()> {
    let status = service.get_update_status()?;
    print_status(&status, &service.source_names());
    Ok(())
}

fn print_status(status: &UpdateStatus, configured: &[String]) {
    let optional_time =
        |at: Option<DateTime<Utc>>| at.map_or_else(|| Cell::new("N/A"), ui::timestamp_cell);

    let mut table = ui::new_styled_table();
    table.add_row(vec![ui::header_cell("Status"), ui::freshness_cell(status.status)]);
    table.add_row(vec![
        ui::header_cell("Cached rates"),
        Cell::new(status.total_rates),
    ]);
    table.add_row(vec![
        ui::header_cell("Sources in cache"),
        Cell::new(status.sources.join(", ")),
    ]);
    table.add_row(vec![
        ui::header_cell("Configured sources"),
        Cell::new(configured.join(", ")),
    ]);
    table.add_row(vec![
        ui::header_cell("TTL"),
        Cell::new(format!("{}s", status.ttl_seconds)),
    ]);
    table.add_row(vec![
        ui::header_cell("Oldest update"),
        optional_time(status.oldest_update),
    ]);
    table.add_row(vec![
        ui::header_cell("Newest update"),
        optional_time(status.newest_update),
    ]);
    println!("{table}");
}
