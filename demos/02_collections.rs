/// collections - aging, escalation and reminders with controlled time
use kinder_billing::{
    BillingConfig, BillingEngine, Child, DeliveryChannel, DeliveryLog, DeliveryOutcome,
    EscalationTracker, FeeKind, FeeLineItem, InMemoryScheduler, InMemoryStore, Locale, Money,
    Period, RepeatPolicy, ReminderRequest, SafeTimeProvider, Tier, TimeSource,
};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

/// prints instead of sending to a chat
struct ConsoleChannel;

impl DeliveryChannel for ConsoleChannel {
    fn deliver(&self, request: &ReminderRequest) -> DeliveryOutcome {
        println!("  -> [{} / {}] {}", request.tier, request.locale, request.message);
        DeliveryOutcome::Delivered
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== collections example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 9, 1, 9, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let engine = BillingEngine::new(
        BillingConfig::kindergarten_default(),
        Arc::new(InMemoryStore::new()),
    )?;
    let invoice = engine.price_invoice(
        &Child::new("c-1", "Aziza"),
        Period::new(2024, 9)?,
        vec![FeeLineItem::new("tuition", FeeKind::Monthly, "Tuition", Money::from_major(1_800_000))],
        None,
        &time,
    )?;
    println!("issued {} due {}", invoice.number(), invoice.due_date());

    let mut trackers = vec![EscalationTracker::new(invoice.number())];
    let channel = ConsoleChannel;
    let log = DeliveryLog::new();

    // daily job for six weeks
    for _ in 0..42 {
        controller.advance(Duration::days(1));
        for transition in engine.evaluate_escalations(&mut trackers, &time)? {
            println!(
                "{}: {:?} -> {:?} ({} days overdue)",
                time.now().format("%Y-%m-%d"),
                transition.from,
                transition.to,
                transition.days_overdue
            );
            if let Some(tier) = transition.to.tier() {
                let request = engine.build_reminder(invoice.number(), tier, Locale::En, &time)?;
                if let Some(report) = log.dispatch(&channel, &request, time.now()) {
                    engine.report_delivery(&report);
                }
            }
        }

        if time.now().date_naive() == invoice.due_date() + Duration::days(20) {
            engine.record_payment(
                invoice.number(),
                Money::from_major(800_000),
                kinder_billing::PaymentMethod::Cash,
                None,
                &time,
            )?;
            println!("partial payment received, remaining {}", engine.debt(invoice.number(), &time)?.remaining());
        }
    }

    // a weekly Russian reminder, then cancelled
    let scheduler = InMemoryScheduler::new();
    let key = engine.schedule_reminder(
        &scheduler,
        invoice.number(),
        Tier::Final,
        Locale::Ru,
        time.now() + Duration::days(1),
        RepeatPolicy::Weekly,
        &time,
    )?;
    controller.advance(Duration::days(1));
    for request in scheduler.due(time.now()) {
        println!("scheduled: {}", request.message);
    }
    println!("cancel: {:?}", engine.cancel_reminder(&scheduler, &key, &time));

    println!("\n{} events emitted", engine.take_events().len());
    Ok(())
}
