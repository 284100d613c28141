/// quick start - issue one invoice and pay it
use kinder_billing::{
    BillingConfig, BillingEngine, Child, FeeKind, InMemoryStore, PaymentMethod, Period,
    SafeTimeProvider, TimeSource,
};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = BillingConfig::kindergarten_default();
    let engine = BillingEngine::new(config.clone(), Arc::new(InMemoryStore::new()))?;
    let time = SafeTimeProvider::new(TimeSource::System);

    // monthly tuition plus meals from the catalog
    let mut items = config.catalog_items(FeeKind::Monthly);
    items.extend(config.catalog_items(FeeKind::Food));

    let child = Child::new("c-1", "Aziza");
    let period = Period::containing(time.now().date_naive());
    let invoice = engine.price_invoice(&child, period, items, None, &time)?;
    println!("issued {} for {}: {}", invoice.number(), child.name, invoice.total());

    let receipt = engine.record_payment(
        invoice.number(),
        invoice.total(),
        PaymentMethod::Transfer,
        Some("BANK-0001".to_string()),
        &time,
    )?;
    println!("status: {:?}, remaining {}", receipt.status, receipt.remaining);

    Ok(())
}
