use super::ui::{self, StyleType};
use crate::core::currency::CurrencyRegistry;
use crate::service::RateService;
use anyhow::{Result, bail};
use tracing::warn;

/// `get-rate`: one directional rate plus the reverse quote when available.
pub async fn run(
    service: &RateService,
    registry: &CurrencyRegistry,
    from: &str,
    to: &str,
) -> Result<()> {
    let (from, to) = match (registry.get(from), registry.get(to)) {
        (Ok(from), Ok(to)) => (from, to),
        (Err(e), _) | (_, Err(e)) => {
            print_known_currencies(registry);
            return Err(e.into());
        }
    };

    let Some(resolved) = service.get_rate(&from.code, &to.code).await? else {
        bail!(
            "Rate {}→{} is unavailable. Try 'update-rates' or check your network connection",
            from.code,
            to.code
        );
    };

    println!(
        "{} {}",
        ui::style_text(&format!("{}→{}:", from.code, to.code), StyleType::Label),
        ui::style_text(&ui::format_rate(resolved.rate), StyleType::Value)
    );
    println!(
        "{}",
        ui::style_text(
            &format!(
                "updated {} · source {}",
                ui::format_timestamp(resolved.updated_at),
                resolved.source.as_deref().unwrap_or("identity")
            ),
            StyleType::Subtle
        )
    );
    println!("  {from}");
    println!("  {to}");

    match service.get_rate(&to.code, &from.code).await {
        Ok(Some(reverse)) => println!(
            "Reverse {}→{}: {}",
            to.code,
            from.code,
            ui::format_rate(reverse.rate)
        ),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Reverse rate lookup failed"),
    }
    Ok(())
}

fn print_known_currencies(registry: &CurrencyRegistry) {
    println!("{}", ui::style_text("Known currencies:", StyleType::Label));
    for currency in registry.all() {
        println!("  {currency}");
    }
}
