use super::ui::{self, StyleType};
use crate::service::RateService;
use anyhow::{Context, Result};
use std::time::Duration;

/// `run-scheduler`: refreshes on a fixed period until Ctrl-C.
pub async fn run(service: &RateService, interval: Duration) -> Result<()> {
    service.start_scheduler();
    println!(
        "{} (every {} minutes, Ctrl-C to stop)",
        ui::style_text("Scheduler running", StyleType::Title),
        interval.as_secs() / 60
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    println!("Stopping scheduler...");
    if !service.stop_scheduler().await {
        println!(
            "{}",
            ui::style_text(
                "Scheduler did not stop cleanly, see logs",
                StyleType::Warning
            )
        );
    }
    Ok(())
}
