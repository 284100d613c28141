/// json views - serializable invoice, debt and balance snapshots
use kinder_billing::{
    BillingConfig, BillingEngine, Child, DebtView, InMemoryStore, InvoiceView, Money,
    PaymentMethod, Period, SafeTimeProvider, TimeSource,
};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = BillingConfig::kindergarten_default();
    println!("=== configuration ===\n{}\n", config.to_json_pretty()?);

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 9, 1, 9, 0, 0).unwrap(),
    ));
    let engine = BillingEngine::new(config.clone(), Arc::new(InMemoryStore::new()))?;
    let child = Child::new("c-1", "Aziza");

    let invoice = engine.price_invoice(
        &child,
        Period::new(2024, 9)?,
        config.fee_catalog.clone(),
        None,
        &time,
    )?;
    println!("=== invoice ===\n{}\n", InvoiceView::from_invoice(&invoice).to_json_pretty()?);

    engine.record_payment(invoice.number(), Money::from_major(500_000), PaymentMethod::Card, None, &time)?;
    time.test_control().unwrap().advance(Duration::days(25));

    let debt = engine.debt(invoice.number(), &time)?;
    println!("=== debt ===\n{}\n", DebtView::from_debt(&debt, engine.thresholds()).to_json_pretty()?);
    println!("=== balance ===\n{}", engine.child_balance(&child.id, &time)?.to_json_pretty()?);

    Ok(())
}
