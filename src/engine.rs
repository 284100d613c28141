use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::collections::aging::{classify, AgingThresholds};
use crate::collections::delivery::{DeliveryOutcome, DeliveryReport};
use crate::collections::escalation::{EscalationState, EscalationTracker, EscalationTransition};
use crate::collections::reminder::{ReminderBuilder, ReminderRequest, ScheduleKey};
use crate::collections::scheduler::{CancelOutcome, ReminderScheduler};
use crate::config::BillingConfig;
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::events::{Event, EventStore};
use crate::fees::FeeScheduleResolver;
use crate::invoice::Invoice;
use crate::ledger::{Debt, DebtLedger, KeyedLocks, Payment, PaymentReceipt, PaymentRequest};
use crate::numbering::InvoiceNumbering;
use crate::store::BillingStore;
use crate::types::{
    AttendanceRecord, Child, ChildId, FeeLineItem, InvoiceStatus, Locale, PaymentId, PaymentMethod,
    Period, RepeatPolicy, Tier,
};
use crate::views::ChildBalance;

/// billing and collections engine for one kindergarten
///
/// Shared across threads by reference. Invoice issuance is serialized per
/// (child, period) and payments per invoice; everything else is a read.
pub struct BillingEngine<S: BillingStore> {
    config: BillingConfig,
    store: Arc<S>,
    resolver: FeeScheduleResolver,
    numbering: InvoiceNumbering<S>,
    ledger: DebtLedger<S>,
    issuing: KeyedLocks<(ChildId, Period)>,
    thresholds: AgingThresholds,
    reminders: ReminderBuilder,
    events: Mutex<EventStore>,
}

impl<S: BillingStore> BillingEngine<S> {
    pub fn new(config: BillingConfig, store: Arc<S>) -> Result<Self> {
        config.validate()?;
        let thresholds = AgingThresholds::from_config(&config.reminders)?;

        Ok(Self {
            resolver: FeeScheduleResolver::new(&config),
            numbering: InvoiceNumbering::new(store.clone()),
            ledger: DebtLedger::new(store.clone()),
            issuing: KeyedLocks::new(),
            reminders: ReminderBuilder::new(config.reminders.clone()),
            events: Mutex::new(EventStore::new()),
            thresholds,
            config,
            store,
        })
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn thresholds(&self) -> &AgingThresholds {
        &self.thresholds
    }

    /// price and issue the invoice for one child and one period
    pub fn price_invoice(
        &self,
        child: &Child,
        period: Period,
        items: Vec<FeeLineItem>,
        attendance: Option<AttendanceRecord>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Invoice> {
        let key = (child.id.clone(), period);
        self.issuing.with_lock(&key, || {
            if let Some(existing) = self.store.find_invoice(&child.id, period)? {
                return Err(BillingError::DuplicateInvoicePeriod {
                    child_id: child.id.clone(),
                    period,
                    existing_number: existing.number().to_string(),
                });
            }

            // price before reserving a number so bad input never burns one
            let breakdown = self.resolver.price(&items, attendance.as_ref())?;
            let number = self.numbering.next(period)?;
            let now = time_provider.now();

            let invoice = Invoice::issue(
                number.to_string(),
                child,
                period,
                now,
                self.resolver.due_date(period),
                items,
                attendance,
                breakdown,
            );
            self.store.save_invoice(&invoice)?;

            log::info!(
                "issued {} for child {} ({}): total {}, due {}",
                invoice.number(),
                invoice.child_id(),
                period,
                invoice.total(),
                invoice.due_date()
            );
            self.emit(Event::InvoiceIssued {
                invoice_number: invoice.number().to_string(),
                child_id: invoice.child_id().to_string(),
                period,
                total: invoice.total(),
                due_date: invoice.due_date(),
                timestamp: now,
            });

            Ok(invoice)
        })
    }

    /// record a payment with system time
    pub fn record_payment_now(
        &self,
        invoice_number: &str,
        amount: Money,
        method: PaymentMethod,
        reference: Option<String>,
    ) -> Result<PaymentReceipt> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.record_payment(invoice_number, amount, method, reference, &time)
    }

    pub fn record_payment(
        &self,
        invoice_number: &str,
        amount: Money,
        method: PaymentMethod,
        reference: Option<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentReceipt> {
        let now = time_provider.now();
        let request = PaymentRequest {
            invoice_number: invoice_number.to_string(),
            amount,
            method,
            reference,
        };

        let receipt = match self.ledger.record_payment(request, now) {
            Ok(receipt) => receipt,
            Err(err) => {
                log::warn!("payment of {} on {} rejected: {}", amount, invoice_number, err);
                self.emit(Event::PaymentRejected {
                    invoice_number: invoice_number.to_string(),
                    amount,
                    reason: err.to_string(),
                    timestamp: now,
                });
                return Err(err);
            }
        };

        self.emit(Event::PaymentRecorded {
            invoice_number: invoice_number.to_string(),
            payment_id: receipt.payment.id,
            amount,
            method,
            remaining: receipt.remaining,
            timestamp: now,
        });

        if receipt.status == InvoiceStatus::Paid {
            log::info!("invoice {} settled", invoice_number);
            self.emit(Event::InvoiceSettled {
                invoice_number: invoice_number.to_string(),
                total_paid: receipt.total_paid,
                timestamp: now,
            });
        }

        Ok(receipt)
    }

    /// cancel an earlier payment with a negative ledger entry
    pub fn reverse_payment(
        &self,
        invoice_number: &str,
        payment_id: PaymentId,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<Payment> {
        let now = time_provider.now();
        let reversal = self.ledger.reverse_payment(invoice_number, payment_id, reason, now)?;

        self.emit(Event::PaymentReversed {
            invoice_number: invoice_number.to_string(),
            payment_id,
            reversal_id: reversal.id,
            amount: -reversal.amount,
            reason: reason.to_string(),
            timestamp: now,
        });
        Ok(reversal)
    }

    /// live balance of an invoice today
    pub fn debt(&self, invoice_number: &str, time_provider: &SafeTimeProvider) -> Result<Debt> {
        self.debt_as_of(invoice_number, time_provider.now().date_naive())
    }

    pub fn debt_as_of(&self, invoice_number: &str, as_of: NaiveDate) -> Result<Debt> {
        self.ledger.debt(invoice_number, as_of)
    }

    /// unsettled debts across all children
    pub fn open_debts(&self, time_provider: &SafeTimeProvider) -> Result<Vec<Debt>> {
        let as_of = time_provider.now().date_naive();
        let mut open = Vec::new();
        for invoice in self.store.list_invoices()? {
            let debt = self.ledger.debt(invoice.number(), as_of)?;
            if !debt.is_settled() {
                open.push(debt);
            }
        }
        Ok(open)
    }

    pub fn child_balance(
        &self,
        child_id: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<ChildBalance> {
        let as_of = time_provider.now().date_naive();
        let debts = self
            .store
            .list_invoices_for_child(child_id)?
            .iter()
            .map(|invoice| self.ledger.debt(invoice.number(), as_of))
            .collect::<Result<Vec<_>>>()?;
        Ok(ChildBalance::from_debts(child_id, as_of, &debts, &self.thresholds))
    }

    /// aging tier for a number of days past due
    pub fn classify(&self, days_overdue: u32) -> Tier {
        classify(days_overdue, &self.thresholds)
    }

    /// aging tier of a debt view
    pub fn tier(&self, debt: &Debt) -> Tier {
        debt.tier(&self.thresholds)
    }

    /// re-evaluate one tracker against the current ledger
    pub fn evaluate_escalation(
        &self,
        tracker: &mut EscalationTracker,
        time_provider: &SafeTimeProvider,
    ) -> Result<Option<EscalationTransition>> {
        let now = time_provider.now();
        let debt = self.ledger.debt(tracker.debt_id(), now.date_naive())?;

        let transition = match tracker.evaluate(&debt, &self.thresholds) {
            Some(transition) => transition,
            None => return Ok(None),
        };

        match transition.to {
            EscalationState::Resolved => {
                log::info!("collections resolved for {}", transition.debt_id);
                self.emit(Event::EscalationResolved {
                    invoice_number: transition.debt_id.clone(),
                    timestamp: now,
                });
            }
            to => {
                let from = transition.from.tier().unwrap_or(Tier::NotOverdue);
                let to = to.tier().unwrap_or(Tier::NotOverdue);
                log::info!(
                    "{} escalated {} -> {} at {} days overdue",
                    transition.debt_id,
                    from,
                    to,
                    transition.days_overdue
                );
                self.emit(Event::EscalationAdvanced {
                    invoice_number: transition.debt_id.clone(),
                    from,
                    to,
                    days_overdue: transition.days_overdue,
                    timestamp: now,
                });
            }
        }

        Ok(Some(transition))
    }

    /// re-evaluate a batch of trackers, e.g. from a daily job
    pub fn evaluate_escalations(
        &self,
        trackers: &mut [EscalationTracker],
        time_provider: &SafeTimeProvider,
    ) -> Result<Vec<EscalationTransition>> {
        let mut transitions = Vec::new();
        for tracker in trackers.iter_mut() {
            if let Some(transition) = self.evaluate_escalation(tracker, time_provider)? {
                transitions.push(transition);
            }
        }
        Ok(transitions)
    }

    /// immediate reminder for an invoice at `tier`
    pub fn build_reminder(
        &self,
        invoice_number: &str,
        tier: Tier,
        locale: Locale,
        time_provider: &SafeTimeProvider,
    ) -> Result<ReminderRequest> {
        let now = time_provider.now();
        let debt = self.ledger.debt(invoice_number, now.date_naive())?;
        let request = self.reminders.build(&debt, tier, locale)?;

        self.emit(Event::ReminderBuilt {
            invoice_number: invoice_number.to_string(),
            tier,
            timestamp: now,
        });
        Ok(request)
    }

    /// reminder at the debt's current tier in the default locale, if one is due
    pub fn current_reminder(
        &self,
        invoice_number: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<Option<ReminderRequest>> {
        let debt = self.debt(invoice_number, time_provider)?;
        let tier = self.tier(&debt);
        if !tier.is_overdue() {
            return Ok(None);
        }
        self.build_reminder(invoice_number, tier, self.config.reminders.default_locale, time_provider)
            .map(Some)
    }

    /// hand a reminder to the scheduler for later dispatch
    #[allow(clippy::too_many_arguments)]
    pub fn schedule_reminder<R: ReminderScheduler + ?Sized>(
        &self,
        scheduler: &R,
        invoice_number: &str,
        tier: Tier,
        locale: Locale,
        at: DateTime<Utc>,
        repeat_policy: RepeatPolicy,
        time_provider: &SafeTimeProvider,
    ) -> Result<ScheduleKey> {
        let now = time_provider.now();
        let debt = self.ledger.debt(invoice_number, now.date_naive())?;
        let request = self.reminders.schedule(&debt, tier, locale, at, repeat_policy)?;
        let key = scheduler.schedule(request)?;

        log::debug!("scheduled {} reminder for {} at {}", tier, invoice_number, at);
        self.emit(Event::ReminderScheduled {
            invoice_number: invoice_number.to_string(),
            tier,
            scheduled_at: at,
            timestamp: now,
        });
        Ok(key)
    }

    pub fn cancel_reminder<R: ReminderScheduler + ?Sized>(
        &self,
        scheduler: &R,
        key: &ScheduleKey,
        time_provider: &SafeTimeProvider,
    ) -> CancelOutcome {
        let outcome = scheduler.cancel(key);
        if outcome == CancelOutcome::AlreadyFired {
            log::debug!("reminder {:?} already fired, nothing to cancel", key);
        }

        self.emit(Event::ReminderCancelled {
            invoice_number: key.debt_id.clone(),
            tier: key.tier,
            scheduled_at: key.scheduled_at,
            cancelled: outcome == CancelOutcome::Cancelled,
            timestamp: time_provider.now(),
        });
        outcome
    }

    /// accept a delivery report from the transport; never touches the ledger
    pub fn report_delivery(&self, report: &DeliveryReport) {
        let reason = match &report.outcome {
            DeliveryOutcome::Delivered => {
                log::info!("delivered {} reminder for {}", report.key.tier, report.key.debt_id);
                None
            }
            DeliveryOutcome::Failed(reason) => {
                log::warn!(
                    "failed to deliver {} reminder for {}: {}",
                    report.key.tier,
                    report.key.debt_id,
                    reason
                );
                Some(reason.clone())
            }
        };

        self.emit(Event::DeliveryReported {
            invoice_number: report.key.debt_id.clone(),
            tier: report.key.tier,
            delivered: reason.is_none(),
            reason,
            timestamp: report.reported_at,
        });
    }

    /// drain events emitted so far
    pub fn take_events(&self) -> Vec<Event> {
        self.events.lock().take_events()
    }

    fn emit(&self, event: Event) {
        self.events.lock().emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::delivery::DeliveryLog;
    use crate::collections::reminder::ReminderKey;
    use crate::collections::scheduler::InMemoryScheduler;
    use crate::store::InMemoryStore;
    use crate::types::FeeKind;
    use chrono::{Duration, TimeZone};
    use hourglass_rs::TimeSource;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn engine() -> BillingEngine<InMemoryStore> {
        BillingEngine::new(BillingConfig::kindergarten_default(), Arc::new(InMemoryStore::new())).unwrap()
    }

    fn clock(month: u32, day: u32) -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, month, day, 9, 0, 0).unwrap(),
        ))
    }

    fn september() -> Period {
        Period::new(2024, 9).unwrap()
    }

    fn aziza() -> Child {
        Child::new("c-1", "Aziza")
    }

    fn standard_items() -> Vec<FeeLineItem> {
        vec![
            FeeLineItem::new("tuition", FeeKind::Monthly, "Tuition", Money::from_major(1_500_000)),
            FeeLineItem::new("food", FeeKind::Food, "Meals", Money::from_major(300_000)),
            FeeLineItem::new("bus", FeeKind::Transport, "Bus", Money::ZERO),
        ]
    }

    fn tuition_only(amount: i64) -> Vec<FeeLineItem> {
        vec![FeeLineItem::new("tuition", FeeKind::Monthly, "Tuition", Money::from_major(amount))]
    }

    #[test]
    fn test_full_attendance_invoice() {
        let engine = engine();
        let invoice = engine
            .price_invoice(
                &aziza(),
                september(),
                standard_items(),
                Some(AttendanceRecord::new(22, 22).unwrap()),
                &clock(9, 1),
            )
            .unwrap();

        assert_eq!(invoice.number(), "INV-202409-0001");
        assert_eq!(invoice.attendance_deduction(), Money::ZERO);
        assert_eq!(invoice.total(), Money::from_major(1_800_000));

        let events = engine.take_events();
        assert!(events.iter().any(|e| matches!(e, Event::InvoiceIssued { .. })));
    }

    #[test]
    fn test_absence_deduction_invoice() {
        let engine = engine();
        let invoice = engine
            .price_invoice(
                &aziza(),
                september(),
                standard_items(),
                Some(AttendanceRecord::new(22, 15).unwrap()),
                &clock(9, 1),
            )
            .unwrap();

        assert_eq!(invoice.attendance_deduction(), Money::from_major(136_364));
        assert_eq!(invoice.total(), Money::from_major(1_663_636));
    }

    #[test]
    fn test_duplicate_period_rejected() {
        let engine = engine();
        engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &clock(9, 1))
            .unwrap();

        let err = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &clock(9, 2))
            .unwrap_err();
        assert_eq!(
            err,
            BillingError::DuplicateInvoicePeriod {
                child_id: "c-1".to_string(),
                period: september(),
                existing_number: "INV-202409-0001".to_string(),
            }
        );

        // another child shares the period sequence
        let other = engine
            .price_invoice(&Child::new("c-2", "Bobur"), september(), tuition_only(500_000), None, &clock(9, 1))
            .unwrap();
        assert_eq!(other.number(), "INV-202409-0002");
    }

    #[test]
    fn test_invalid_items_do_not_consume_numbers() {
        let engine = engine();
        let bad = vec![FeeLineItem::new("food", FeeKind::Food, "Meals", Money::from_major(-10))];
        assert!(engine.price_invoice(&aziza(), september(), bad, None, &clock(9, 1)).is_err());

        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &clock(9, 1))
            .unwrap();
        assert_eq!(invoice.number(), "INV-202409-0001");
    }

    #[test]
    fn test_full_payment_settles_and_resolves() {
        let engine = engine();
        let time = clock(9, 1);
        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &time)
            .unwrap();
        let mut tracker = EscalationTracker::new(invoice.number());

        time.test_control().unwrap().advance(Duration::days(19));
        engine.evaluate_escalation(&mut tracker, &time).unwrap();
        assert_eq!(tracker.state(), EscalationState::Reminder);

        engine
            .record_payment(invoice.number(), Money::from_major(200_000), PaymentMethod::Cash, None, &time)
            .unwrap();
        let receipt = engine
            .record_payment(invoice.number(), Money::from_major(300_000), PaymentMethod::Cash, None, &time)
            .unwrap();
        assert_eq!(receipt.status, InvoiceStatus::Paid);
        assert_eq!(receipt.remaining, Money::ZERO);

        let transition = engine.evaluate_escalation(&mut tracker, &time).unwrap().unwrap();
        assert_eq!(transition.to, EscalationState::Resolved);

        let events = engine.take_events();
        assert!(events.iter().any(|e| matches!(e, Event::InvoiceSettled { .. })));
        assert!(events.iter().any(|e| matches!(e, Event::EscalationResolved { .. })));
    }

    #[test]
    fn test_overpayment_rejected_without_state_change() {
        let engine = engine();
        let time = clock(9, 1);
        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &time)
            .unwrap();
        engine
            .record_payment(invoice.number(), Money::from_major(500_000), PaymentMethod::Card, None, &time)
            .unwrap();
        engine.take_events();

        let err = engine
            .record_payment(invoice.number(), Money::from_major(1), PaymentMethod::Card, None, &time)
            .unwrap_err();
        assert!(matches!(err, BillingError::OverpaymentRejected { .. }));

        let debt = engine.debt(invoice.number(), &time).unwrap();
        assert_eq!(debt.payments.len(), 1);
        assert_eq!(debt.status(), InvoiceStatus::Paid);
        assert!(matches!(engine.take_events().as_slice(), [Event::PaymentRejected { .. }]));
    }

    #[test]
    fn test_overpayment_on_fresh_invoice_rejected() {
        let engine = engine();
        let time = clock(9, 1);
        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &time)
            .unwrap();
        engine.take_events();

        let err = engine
            .record_payment(invoice.number(), Money::from_major(600_000), PaymentMethod::Cash, None, &time)
            .unwrap_err();
        assert_eq!(
            err,
            BillingError::OverpaymentRejected {
                invoice_number: invoice.number().to_string(),
                remaining: Money::from_major(500_000),
                attempted: Money::from_major(600_000),
            }
        );

        let debt = engine.debt(invoice.number(), &time).unwrap();
        assert_eq!(debt.remaining(), Money::from_major(500_000));
        assert_eq!(debt.status(), InvoiceStatus::Unpaid);
        assert!(debt.payments.is_empty());
        assert!(matches!(engine.take_events().as_slice(), [Event::PaymentRejected { .. }]));
    }

    /// fails every invoice read once a payment has been appended
    struct ReadFailsAfterAppend {
        inner: InMemoryStore,
        appended: AtomicBool,
    }

    impl BillingStore for ReadFailsAfterAppend {
        fn load_invoice(&self, number: &str) -> Result<Option<Invoice>> {
            if self.appended.load(Ordering::SeqCst) {
                return Err(BillingError::Storage {
                    message: "connection reset".to_string(),
                });
            }
            self.inner.load_invoice(number)
        }

        fn find_invoice(&self, child_id: &str, period: Period) -> Result<Option<Invoice>> {
            self.inner.find_invoice(child_id, period)
        }

        fn save_invoice(&self, invoice: &Invoice) -> Result<()> {
            self.inner.save_invoice(invoice)
        }

        fn append_payment(&self, payment: &Payment) -> Result<()> {
            self.inner.append_payment(payment)?;
            self.appended.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn list_payments_for_invoice(&self, number: &str) -> Result<Vec<Payment>> {
            self.inner.list_payments_for_invoice(number)
        }

        fn reserve_next_invoice_number(&self, period: Period) -> Result<u32> {
            self.inner.reserve_next_invoice_number(period)
        }

        fn list_invoices_for_child(&self, child_id: &str) -> Result<Vec<Invoice>> {
            self.inner.list_invoices_for_child(child_id)
        }

        fn list_invoices(&self) -> Result<Vec<Invoice>> {
            self.inner.list_invoices()
        }
    }

    #[test]
    fn test_settlement_does_not_reread_store() {
        let store = Arc::new(ReadFailsAfterAppend {
            inner: InMemoryStore::new(),
            appended: AtomicBool::new(false),
        });
        let engine = BillingEngine::new(BillingConfig::kindergarten_default(), store).unwrap();
        let time = clock(9, 1);
        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &time)
            .unwrap();
        engine.take_events();

        let receipt = engine
            .record_payment(invoice.number(), Money::from_major(500_000), PaymentMethod::Card, None, &time)
            .unwrap();
        assert_eq!(receipt.status, InvoiceStatus::Paid);
        assert_eq!(receipt.total_paid, Money::from_major(500_000));

        let events = engine.take_events();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::InvoiceSettled { total_paid, .. } if *total_paid == Money::from_major(500_000)
        )));
    }

    #[test]
    fn test_ten_days_overdue_is_reminder_tier() {
        let engine = engine();
        assert_eq!(engine.classify(10), Tier::Reminder);

        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &clock(9, 1))
            .unwrap();
        let debt = engine.debt(invoice.number(), &clock(9, 20)).unwrap();
        assert_eq!(debt.days_overdue(), 10);
        assert_eq!(engine.tier(&debt), Tier::Reminder);
    }

    #[test]
    fn test_concurrent_payments_one_wins() {
        let engine = &engine();
        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &clock(9, 1))
            .unwrap();
        let number = invoice.number();

        let results: Vec<Result<PaymentReceipt>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(move || {
                        engine.record_payment(
                            number,
                            Money::from_major(300_000),
                            PaymentMethod::Cash,
                            None,
                            &clock(9, 5),
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let rejected = results.into_iter().find_map(|r| r.err()).unwrap();
        assert_eq!(
            rejected,
            BillingError::OverpaymentRejected {
                invoice_number: number.to_string(),
                remaining: Money::from_major(200_000),
                attempted: Money::from_major(300_000),
            }
        );
        assert_eq!(
            engine.debt(number, &clock(9, 5)).unwrap().remaining(),
            Money::from_major(200_000)
        );
    }

    #[test]
    fn test_concurrent_issuance_one_invoice_per_period() {
        let engine = &engine();
        let results: Vec<Result<Invoice>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(move || {
                        engine.price_invoice(&aziza(), september(), tuition_only(500_000), None, &clock(9, 1))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(engine.store().invoice_count(), 1);
    }

    #[test]
    fn test_transfer_requires_reference() {
        let engine = engine();
        let time = clock(9, 1);
        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &time)
            .unwrap();

        let err = engine
            .record_payment(invoice.number(), Money::from_major(100_000), PaymentMethod::Transfer, None, &time)
            .unwrap_err();
        assert!(matches!(err, BillingError::MissingReference { .. }));

        assert!(engine
            .record_payment(
                invoice.number(),
                Money::from_major(100_000),
                PaymentMethod::Transfer,
                Some("BANK-1".to_string()),
                &time
            )
            .is_ok());
    }

    #[test]
    fn test_reversal_reopens_debt() {
        let engine = engine();
        let time = clock(9, 1);
        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &time)
            .unwrap();
        let receipt = engine
            .record_payment(invoice.number(), Money::from_major(500_000), PaymentMethod::Cash, None, &time)
            .unwrap();

        engine
            .reverse_payment(invoice.number(), receipt.payment.id, "counterfeit note", &time)
            .unwrap();

        let debt = engine.debt(invoice.number(), &time).unwrap();
        assert_eq!(debt.remaining(), Money::from_major(500_000));
        assert!(engine
            .take_events()
            .iter()
            .any(|e| matches!(e, Event::PaymentReversed { amount, .. } if *amount == Money::from_major(500_000))));
    }

    #[test]
    fn test_escalation_moves_forward_only() {
        let engine = engine();
        let time = clock(9, 1);
        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &time)
            .unwrap();
        let mut trackers = vec![EscalationTracker::new(invoice.number())];
        let control = time.test_control().unwrap();

        // on the due date nothing is overdue yet
        control.advance(Duration::days(9));
        assert!(engine.evaluate_escalations(&mut trackers, &time).unwrap().is_empty());

        control.advance(Duration::days(15));
        let transitions = engine.evaluate_escalations(&mut trackers, &time).unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].from, EscalationState::NotOverdue);
        assert_eq!(transitions[0].to, EscalationState::Urgent);

        control.advance(Duration::days(20));
        engine.evaluate_escalations(&mut trackers, &time).unwrap();
        assert_eq!(trackers[0].state(), EscalationState::Final);
        assert!(engine.evaluate_escalations(&mut trackers, &time).unwrap().is_empty());
    }

    #[test]
    fn test_reminders_and_delivery() {
        let engine = engine();
        let time = clock(9, 1);
        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &time)
            .unwrap();

        assert!(engine.current_reminder(invoice.number(), &time).unwrap().is_none());
        assert!(matches!(
            engine.build_reminder(invoice.number(), Tier::NotOverdue, Locale::En, &time),
            Err(BillingError::ReminderSuppressed { .. })
        ));

        time.test_control().unwrap().advance(Duration::days(11));
        let current = engine.current_reminder(invoice.number(), &time).unwrap().unwrap();
        assert_eq!(current.tier, Tier::Gentle);
        assert_eq!(current.locale, Locale::Uz);

        let report = DeliveryReport {
            key: ReminderKey {
                debt_id: invoice.number().to_string(),
                tier: Tier::Gentle,
            },
            scheduled_at: None,
            outcome: DeliveryOutcome::Failed("chat blocked".to_string()),
            reported_at: time.now(),
        };
        engine.report_delivery(&report);

        // delivery outcome never affects the balance
        assert_eq!(
            engine.debt(invoice.number(), &time).unwrap().remaining(),
            Money::from_major(500_000)
        );
        let log = DeliveryLog::new();
        log.record(&report);
        assert!(log.should_send(&report.key));
    }

    #[test]
    fn test_schedule_and_cancel() {
        let engine = engine();
        let time = clock(9, 1);
        let invoice = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &time)
            .unwrap();
        time.test_control().unwrap().advance(Duration::days(20));

        let scheduler = InMemoryScheduler::new();
        let at = time.now() + Duration::days(1);
        let key = engine
            .schedule_reminder(
                &scheduler,
                invoice.number(),
                Tier::Reminder,
                Locale::Ru,
                at,
                RepeatPolicy::None,
                &time,
            )
            .unwrap();
        assert_eq!(scheduler.pending_count(), 1);

        assert_eq!(engine.cancel_reminder(&scheduler, &key, &time), CancelOutcome::Cancelled);
        assert_eq!(engine.cancel_reminder(&scheduler, &key, &time), CancelOutcome::NotFound);
        assert!(scheduler.due(at).is_empty());
    }

    #[test]
    fn test_child_balance() {
        let engine = engine();
        let time = clock(9, 1);
        let sep = engine
            .price_invoice(&aziza(), september(), tuition_only(500_000), None, &time)
            .unwrap();
        engine
            .price_invoice(&aziza(), september().next(), tuition_only(600_000), None, &time)
            .unwrap();
        engine
            .record_payment(sep.number(), Money::from_major(500_000), PaymentMethod::Cash, None, &time)
            .unwrap();

        time.test_control().unwrap().advance(Duration::days(45));
        let balance = engine.child_balance("c-1", &time).unwrap();
        assert_eq!(balance.total_invoiced, Money::from_major(1_100_000));
        assert_eq!(balance.outstanding, Money::from_major(600_000));
        assert_eq!(balance.open_debts.len(), 1);
        assert_eq!(balance.worst_tier, Tier::Gentle);
        assert_eq!(engine.open_debts(&time).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = BillingConfig::kindergarten_default();
        config.payment_terms.due_day_of_month = 31;
        assert!(BillingEngine::new(config, Arc::new(InMemoryStore::new())).is_err());
    }
}
