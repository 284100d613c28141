/// attendance - how absences reduce the monthly fee
use kinder_billing::{
    AttendanceCalculator, AttendanceRecord, BillingConfig, BillingEngine, Child, FeeKind,
    FeeLineItem, InMemoryStore, Money, Period, SafeTimeProvider, TimeSource,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== attendance example ===\n");

    let config = BillingConfig::kindergarten_default();
    let calculator = AttendanceCalculator::new(config.attendance, config.currency_scale);
    let fee = Money::from_major(1_500_000);

    println!(
        "grace days: {}, penalty rate: {}",
        config.attendance.grace_days, config.attendance.penalty_rate
    );
    for present in [22, 19, 18, 15, 0] {
        let record = AttendanceRecord::new(22, present)?;
        let result = calculator.calculate(fee, &record);
        println!(
            "present {:>2}/22: absent {:>2}, credited {:>2}, deduction {}",
            present, result.absent_days, result.days_credited, result.deduction
        );
    }

    // the deduction only applies to the monthly fee, never to meals or extras
    let engine = BillingEngine::new(config, Arc::new(InMemoryStore::new()))?;
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap(),
    ));
    let items = vec![
        FeeLineItem::new("tuition", FeeKind::Monthly, "Tuition", fee),
        FeeLineItem::new("food", FeeKind::Food, "Meals", Money::from_major(300_000)),
        FeeLineItem::new("sibling", FeeKind::Discount, "Sibling discount", Money::from_major(100_000)),
    ];
    let invoice = engine.price_invoice(
        &Child::new("c-1", "Aziza"),
        Period::new(2024, 9)?,
        items,
        Some(AttendanceRecord::new(22, 15)?),
        &time,
    )?;

    println!("\n{}", invoice.number());
    println!("  subtotal:   {}", invoice.subtotal());
    println!("  discounts:  {}", invoice.discount_total());
    println!("  attendance: {}", invoice.attendance_deduction());
    println!("  total:      {}", invoice.total());
    println!("  due:        {}", invoice.due_date());

    Ok(())
}
