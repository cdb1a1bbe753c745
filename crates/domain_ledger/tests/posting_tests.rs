//! End-to-end posting scenarios over the in-memory store

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{Currency, DateRange, InvoiceId};
use domain_ledger::{
    AccountRole, CashSubtype, ChartOfAccounts, CurrencyConverter, EntryStatus, InMemoryLedgerStore,
    JournalEngine, LedgerConfig, LedgerError, LedgerStore, LedgerWriters, PostingOutcome,
    PostingRuleEngine, RoleMap, SourceKind, StandardChart, StaticRateTable,
};
use test_utils::{
    assert_entry_balanced, assert_trial_balance_row, assert_trial_balance_without, init_tracing,
    CashTransactionBuilder, DateFixtures, IdFixtures, LedgerFixtures, MoneyFixtures,
    PurchaseInvoiceBuilder, SaleInvoiceBuilder, StockMovementBuilder, foreign_currency_strategy,
};

fn january() -> (chrono::NaiveDate, chrono::NaiveDate) {
    (DateFixtures::year_start(), DateFixtures::date(2024, 1, 31))
}

// ============================================================================
// Sale and purchase invoices
// ============================================================================

mod invoice_tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_sale_trial_balance() {
        init_tracing();
        let fx = LedgerFixtures::seeded().await;
        let ledger = &fx.ledger;

        let outcome = ledger
            .posting()
            .post_event(fx.company, &SaleInvoiceBuilder::new().posted())
            .await
            .unwrap();
        let entry_id = outcome.entry_id().unwrap();

        let entry = ledger.journal().get(fx.company, entry_id).await.unwrap();
        assert_eq!(entry.entry.status, EntryStatus::Posted);
        assert_eq!(entry.entry.number, "JV-2024-000001");
        assert_eq!(entry.entry.source.map(|s| s.kind), Some(SourceKind::SaleInvoice));
        assert_entry_balanced(&entry);

        let (from, to) = january();
        let tb = ledger.projector().trial_balance(fx.company, from, to).await.unwrap();
        assert_trial_balance_row(&tb, "120", dec!(1200), dec!(0));
        assert_trial_balance_row(&tb, "391", dec!(0), dec!(200));
        assert_trial_balance_row(&tb, "600", dec!(0), dec!(1000));
        assert_eq!(tb.rows.len(), 3);
        assert!(tb.is_balanced);
        assert_eq!(tb.total_debit.amount(), dec!(1200));
    }

    #[tokio::test]
    async fn test_cancelled_sale_nets_to_zero() {
        let fx = LedgerFixtures::seeded().await;
        let sale = SaleInvoiceBuilder::new();

        let original = fx
            .ledger
            .posting()
            .post_event(fx.company, &sale.clone().posted())
            .await
            .unwrap();
        let cancel = fx
            .ledger
            .posting()
            .post_event(fx.company, &sale.cancelled(DateFixtures::later_in_january()))
            .await
            .unwrap();

        let cancel_entry = fx
            .ledger
            .journal()
            .get(fx.company, cancel.entry_id().unwrap())
            .await
            .unwrap();
        assert_eq!(
            cancel_entry.entry.source.map(|s| s.kind),
            Some(SourceKind::SaleInvoiceCancellation)
        );
        assert_eq!(cancel_entry.entry.date, DateFixtures::later_in_january());
        assert_entry_balanced(&cancel_entry);

        let original_entry = fx
            .ledger
            .journal()
            .get(fx.company, original.entry_id().unwrap())
            .await
            .unwrap();
        assert_eq!(original_entry.entry.status, EntryStatus::Posted);

        let (from, to) = january();
        let tb = fx.ledger.projector().trial_balance(fx.company, from, to).await.unwrap();
        assert!(tb.rows.is_empty());
        assert_trial_balance_without(&tb, &["120", "391", "600"]);
    }

    #[tokio::test]
    async fn test_cancel_without_posted_invoice_is_rejected() {
        let fx = LedgerFixtures::seeded().await;
        let event = SaleInvoiceBuilder::new().cancelled(DateFixtures::later_in_january());

        let result = fx.ledger.posting().post_event(fx.company, &event).await;
        assert!(matches!(result, Err(LedgerError::State(_))));
    }

    #[tokio::test]
    async fn test_cancel_with_different_amounts_is_rejected() {
        let fx = LedgerFixtures::seeded().await;
        let invoice_id = InvoiceId::new();
        fx.ledger
            .posting()
            .post_event(fx.company, &SaleInvoiceBuilder::new().with_invoice_id(invoice_id).posted())
            .await
            .unwrap();

        let altered = SaleInvoiceBuilder::new()
            .with_invoice_id(invoice_id)
            .with_amounts(dec!(900), dec!(100))
            .cancelled(DateFixtures::later_in_january());
        let result = fx.ledger.posting().post_event(fx.company, &altered).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));

        let entries = fx
            .ledger
            .journal()
            .entries(fx.company, DateRange::all_time(), None)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_reuses_posted_accounts_after_override() {
        let fx = LedgerFixtures::seeded().await;
        let invoice_id = InvoiceId::new();
        let sale = SaleInvoiceBuilder::new()
            .with_invoice_id(invoice_id)
            .with_revenue_account("649");
        let original = fx
            .ledger
            .posting()
            .post_event(fx.company, &sale.posted())
            .await
            .unwrap();

        // The cancellation payload lost its override; the stored entry decides
        let cancel = fx
            .ledger
            .posting()
            .post_event(
                fx.company,
                &SaleInvoiceBuilder::new()
                    .with_invoice_id(invoice_id)
                    .cancelled(DateFixtures::later_in_january()),
            )
            .await
            .unwrap();

        let original = fx.ledger.journal().get(fx.company, original.entry_id().unwrap()).await.unwrap();
        let cancel = fx.ledger.journal().get(fx.company, cancel.entry_id().unwrap()).await.unwrap();
        for (o, c) in original.lines.iter().zip(&cancel.lines) {
            assert_eq!(o.account_id, c.account_id);
            assert_eq!((o.debit, o.credit), (c.credit, c.debit));
            assert_eq!(o.amount_base, c.amount_base);
        }

        let (from, to) = january();
        let tb = fx.ledger.projector().trial_balance(fx.company, from, to).await.unwrap();
        assert!(tb.rows.is_empty());
    }

    #[tokio::test]
    async fn test_same_event_twice_is_duplicate() {
        let fx = LedgerFixtures::seeded().await;
        let event = SaleInvoiceBuilder::new().posted();

        fx.ledger.posting().post_event(fx.company, &event).await.unwrap();
        let second = fx.ledger.posting().post_event(fx.company, &event).await;
        assert!(matches!(second, Err(LedgerError::Duplicate(_))));

        let entries = fx
            .ledger
            .journal()
            .entries(fx.company, DateRange::all_time(), None)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_purchase_with_expense_override() {
        let fx = LedgerFixtures::seeded().await;
        let event = PurchaseInvoiceBuilder::new().with_expense_account("653").posted();

        fx.ledger.posting().post_event(fx.company, &event).await.unwrap();

        let (from, to) = january();
        let tb = fx.ledger.projector().trial_balance(fx.company, from, to).await.unwrap();
        assert_trial_balance_row(&tb, "653", dec!(500), dec!(0));
        assert_trial_balance_row(&tb, "191", dec!(100), dec!(0));
        assert_trial_balance_row(&tb, "320", dec!(0), dec!(600));
        assert!(tb.row("770").is_none());
    }

    #[tokio::test]
    async fn test_zero_tax_sale_has_two_lines() {
        let fx = LedgerFixtures::seeded().await;
        let event = SaleInvoiceBuilder::new().with_amounts(dec!(450), dec!(0)).posted();

        let outcome = fx.ledger.posting().post_event(fx.company, &event).await.unwrap();
        let entry = fx
            .ledger
            .journal()
            .get(fx.company, outcome.entry_id().unwrap())
            .await
            .unwrap();
        assert_eq!(entry.lines.len(), 2);
        assert_eq!(entry.entry.total_debit, 45000);
    }
}

// ============================================================================
// Foreign currency
// ============================================================================

mod currency_tests {
    use super::*;

    #[tokio::test]
    async fn test_usd_sale_posts_in_base_currency() {
        let fx = LedgerFixtures::seeded().await;
        let event = SaleInvoiceBuilder::new()
            .with_currency(Currency::USD)
            .with_amounts(dec!(10), dec!(0))
            .posted();

        let outcome = fx.ledger.posting().post_event(fx.company, &event).await.unwrap();
        let entry = fx
            .ledger
            .journal()
            .get(fx.company, outcome.entry_id().unwrap())
            .await
            .unwrap();

        for line in &entry.lines {
            assert_eq!(line.currency, Currency::USD);
            assert_eq!(line.fx_rate, MoneyFixtures::usd_rate());
            assert_eq!(line.amount_minor(), 1000);
            assert_eq!(line.amount_base, 32457);
        }
        assert_entry_balanced(&entry);
    }

    #[tokio::test]
    async fn test_usd_cancel_uses_invoice_date_rate() {
        let fx = LedgerFixtures::seeded().await;
        let sale = SaleInvoiceBuilder::new()
            .with_currency(Currency::USD)
            .with_amounts(dec!(10), dec!(2));

        fx.ledger.posting().post_event(fx.company, &sale.clone().posted()).await.unwrap();
        // February carries a different rate; the cancel must still net to zero
        let cancel = fx
            .ledger
            .posting()
            .post_event(fx.company, &sale.cancelled(DateFixtures::february()))
            .await
            .unwrap();

        let entry = fx
            .ledger
            .journal()
            .get(fx.company, cancel.entry_id().unwrap())
            .await
            .unwrap();
        assert!(entry.lines.iter().all(|l| l.fx_rate == MoneyFixtures::usd_rate()));

        let tb = fx
            .ledger
            .projector()
            .trial_balance(fx.company, DateFixtures::year_start(), DateFixtures::year_end())
            .await
            .unwrap();
        assert!(tb.rows.is_empty());
    }

    #[tokio::test]
    async fn test_small_usd_sale_books_residue_on_receivable() {
        let fx = LedgerFixtures::seeded().await;
        // 0.10 and 0.02 round up separately, 0.12 rounds down as a whole
        let sale = SaleInvoiceBuilder::new()
            .with_currency(Currency::USD)
            .with_amounts(dec!(0.10), dec!(0.02));

        let outcome = fx.ledger.posting().post_event(fx.company, &sale.clone().posted()).await.unwrap();
        let entry = fx
            .ledger
            .journal()
            .get(fx.company, outcome.entry_id().unwrap())
            .await
            .unwrap();
        assert_entry_balanced(&entry);
        let bases: Vec<_> = entry.lines.iter().map(|l| l.amount_base).collect();
        assert_eq!(bases, vec![390, 325, 65]);
        assert_eq!(entry.lines[0].amount_minor(), 12);

        fx.ledger
            .posting()
            .post_event(fx.company, &sale.cancelled(DateFixtures::february()))
            .await
            .unwrap();
        let tb = fx
            .ledger
            .projector()
            .trial_balance(fx.company, DateFixtures::year_start(), DateFixtures::year_end())
            .await
            .unwrap();
        assert!(tb.rows.is_empty());
    }

    #[tokio::test]
    async fn test_small_usd_purchase_books_residue_on_payable() {
        let fx = LedgerFixtures::seeded().await;
        let event = PurchaseInvoiceBuilder::new()
            .with_currency(Currency::USD)
            .with_amounts(dec!(0.10), dec!(0.02))
            .posted();

        fx.ledger.posting().post_event(fx.company, &event).await.unwrap();

        let (from, to) = january();
        let tb = fx.ledger.projector().trial_balance(fx.company, from, to).await.unwrap();
        assert!(tb.is_balanced);
        assert_trial_balance_row(&tb, "191", dec!(0.65), dec!(0));
        assert_trial_balance_row(&tb, "320", dec!(0), dec!(3.90));
    }

    #[tokio::test]
    async fn test_missing_rate_posts_nothing() {
        let fx = LedgerFixtures::seeded().await;
        let event = SaleInvoiceBuilder::new()
            .with_currency(Currency::EUR)
            .posted();

        let result = fx.ledger.posting().post_event(fx.company, &event).await;
        assert!(matches!(
            result,
            Err(LedgerError::RateUnavailable { currency: Currency::EUR, .. })
        ));

        let entries = fx
            .ledger
            .journal()
            .entries(fx.company, DateRange::all_time(), None)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }
}

// ============================================================================
// Cash and inventory
// ============================================================================

mod cash_and_stock_tests {
    use super::*;

    #[tokio::test]
    async fn test_receipt_and_classified_payments() {
        let fx = LedgerFixtures::seeded().await;
        let posting = fx.ledger.posting();

        posting
            .post_event(fx.company, &CashTransactionBuilder::new().receipt().event())
            .await
            .unwrap();
        posting
            .post_event(
                fx.company,
                &CashTransactionBuilder::new()
                    .other(CashSubtype::BankCharge)
                    .with_amount(dec!(15))
                    .event(),
            )
            .await
            .unwrap();
        posting
            .post_event(
                fx.company,
                &CashTransactionBuilder::new()
                    .other(CashSubtype::InterestIncome)
                    .with_amount(dec!(40))
                    .with_counter_account("642")
                    .event(),
            )
            .await
            .unwrap();

        let (from, to) = january();
        let tb = fx.ledger.projector().trial_balance(fx.company, from, to).await.unwrap();
        assert_trial_balance_row(&tb, "100", dec!(275), dec!(0));
        assert_trial_balance_row(&tb, "600", dec!(0), dec!(250));
        assert_trial_balance_row(&tb, "659", dec!(15), dec!(0));
        assert_trial_balance_row(&tb, "642", dec!(0), dec!(40));
        assert!(tb.is_balanced);
    }

    #[tokio::test]
    async fn test_inventory_lifecycle() {
        let fx = LedgerFixtures::seeded().await;
        let posting = fx.ledger.posting();

        posting
            .post_event(fx.company, &StockMovementBuilder::new().receipt())
            .await
            .unwrap();
        posting
            .post_event(
                fx.company,
                &StockMovementBuilder::new().with_quantity(dec!(4)).issue(),
            )
            .await
            .unwrap();
        posting
            .post_event(
                fx.company,
                &StockMovementBuilder::new().counted(dec!(5), dec!(6)),
            )
            .await
            .unwrap();

        let (from, to) = january();
        let tb = fx.ledger.projector().trial_balance(fx.company, from, to).await.unwrap();
        // 125.00 received, 50.00 issued, 12.50 short
        assert_trial_balance_row(&tb, "153", dec!(62.50), dec!(0));
        assert_trial_balance_row(&tb, "320", dec!(0), dec!(125));
        assert_trial_balance_row(&tb, "621", dec!(50), dec!(0));
        assert_trial_balance_row(&tb, "689", dec!(12.50), dec!(0));
    }

    #[tokio::test]
    async fn test_matching_count_is_skipped() {
        let fx = LedgerFixtures::seeded().await;
        let outcome = fx
            .ledger
            .posting()
            .post_event(fx.company, &StockMovementBuilder::new().counted(dec!(6), dec!(6)))
            .await
            .unwrap();

        assert!(matches!(outcome, PostingOutcome::Skipped { .. }));
        assert!(outcome.entry_id().is_none());
    }
}

// ============================================================================
// Configuration and period lock failures
// ============================================================================

mod rejection_tests {
    use super::*;

    #[tokio::test]
    async fn test_role_mapped_to_missing_account_posts_nothing() {
        let config = LedgerConfig {
            roles: RoleMap::standard().with(AccountRole::OutputVat, "399"),
            ..LedgerConfig::default()
        };
        let fx = LedgerFixtures::seeded_with(config, StaticRateTable::new()).await;

        let result = fx
            .ledger
            .posting()
            .post_event(fx.company, &SaleInvoiceBuilder::new().posted())
            .await;
        assert!(matches!(result, Err(LedgerError::Configuration(_))));

        let entries = fx
            .ledger
            .journal()
            .entries(fx.company, DateRange::all_time(), None)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_role_is_configuration_error() {
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let writers = Arc::new(LedgerWriters::new());
        let chart = Arc::new(ChartOfAccounts::new(Arc::clone(&store), Arc::clone(&writers)));
        let journal = Arc::new(JournalEngine::new(
            Arc::clone(&store),
            Arc::clone(&writers),
            Currency::TRY,
            "JV".to_string(),
        ));
        let company = IdFixtures::company();
        chart.seed(company, &StandardChart::trading_company()).await.unwrap();

        let posting = PostingRuleEngine::new(
            journal,
            Arc::clone(&chart),
            Arc::clone(&store),
            CurrencyConverter::new(Currency::TRY, Arc::new(StaticRateTable::new())),
            RoleMap::standard().without(AccountRole::AccountsReceivable),
            Default::default(),
        );

        let result = posting
            .post_event(company, &SaleInvoiceBuilder::new().posted())
            .await;
        match result {
            Err(LedgerError::Configuration(msg)) => assert!(msg.contains("accounts-receivable")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deactivated_role_account_is_configuration_error() {
        let fx = LedgerFixtures::seeded().await;
        let vat = fx.account("391").await;
        fx.ledger.chart().deactivate(fx.company, vat).await.unwrap();

        let result = fx
            .ledger
            .posting()
            .post_event(fx.company, &SaleInvoiceBuilder::new().posted())
            .await;
        assert!(matches!(result, Err(LedgerError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_locked_period_rejects_and_persists_nothing() {
        let fx = LedgerFixtures::seeded().await;
        fx.ledger.periods().lock(fx.company, 2024, 1, "controller").await.unwrap();

        let result = fx
            .ledger
            .posting()
            .post_event(fx.company, &SaleInvoiceBuilder::new().posted())
            .await;
        assert!(matches!(result, Err(ref e) if e.is_period_locked()));

        let (from, to) = january();
        let tb = fx.ledger.projector().trial_balance(fx.company, from, to).await.unwrap();
        assert!(tb.rows.is_empty());

        fx.ledger.periods().unlock(fx.company, 2024, 1).await.unwrap();
        fx.ledger
            .posting()
            .post_event(fx.company, &SaleInvoiceBuilder::new().posted())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ledgers_are_isolated() {
        let fx = LedgerFixtures::seeded().await;
        fx.ledger
            .posting()
            .post_event(fx.company, &SaleInvoiceBuilder::new().posted())
            .await
            .unwrap();

        // The other ledger has no chart, so the role cannot resolve
        let result = fx
            .ledger
            .posting()
            .post_event(IdFixtures::other_company(), &SaleInvoiceBuilder::new().posted())
            .await;
        assert!(matches!(result, Err(LedgerError::Configuration(_))));
    }
}

// ============================================================================
// Concurrency
// ============================================================================

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lock_and_post_race_never_posts_into_locked_period() {
        for _ in 0..20 {
            let fx = Arc::new(LedgerFixtures::seeded().await);

            let poster = {
                let fx = Arc::clone(&fx);
                tokio::spawn(async move {
                    fx.ledger
                        .posting()
                        .post_event(fx.company, &SaleInvoiceBuilder::new().posted())
                        .await
                })
            };
            let locker = {
                let fx = Arc::clone(&fx);
                tokio::spawn(async move {
                    fx.ledger.periods().lock(fx.company, 2024, 1, "controller").await
                })
            };

            let posted = poster.await.unwrap();
            let lock = locker.await.unwrap().unwrap();

            let entries = fx
                .ledger
                .journal()
                .entries(fx.company, DateRange::period(lock.period), None)
                .await
                .unwrap();
            match posted {
                Ok(_) => {
                    assert_eq!(entries.len(), 1);
                    let posted_at = entries[0].posted_at.unwrap();
                    assert!(posted_at <= lock.locked_at);
                }
                Err(e) => {
                    assert!(e.is_period_locked(), "unexpected error {}", e);
                    assert!(entries.iter().all(|e| e.status == EntryStatus::Draft));
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_postings_get_distinct_numbers() {
        let fx = Arc::new(LedgerFixtures::seeded().await);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let fx = Arc::clone(&fx);
                tokio::spawn(async move {
                    fx.ledger
                        .posting()
                        .post_event(fx.company, &SaleInvoiceBuilder::new().posted())
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let entries = fx
            .ledger
            .journal()
            .entries(fx.company, DateRange::all_time(), Some(EntryStatus::Posted))
            .await
            .unwrap();
        let mut numbers: Vec<_> = entries.iter().map(|e| e.number.clone()).collect();
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 10);

        let (from, to) = january();
        let tb = fx.ledger.projector().trial_balance(fx.company, from, to).await.unwrap();
        assert_trial_balance_row(&tb, "120", dec!(12000), dec!(0));
    }
}

// ============================================================================
// Properties
// ============================================================================

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn cents(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_foreign_invoices_always_balance(
        currency in foreign_currency_strategy(),
        subtotal in 100i64..5_000_000i64,
        tax in prop_oneof![Just(0i64), 100i64..1_000_000i64],
        rate in (5_000i64..=1_000_000i64).prop_map(|n| Decimal::new(n, 4)),
    ) {
        runtime().block_on(async {
            let rates = StaticRateTable::new().with_rate(currency, DateFixtures::invoice_date(), rate);
            let fx = LedgerFixtures::seeded_with(LedgerConfig::default(), rates).await;

            let sale = SaleInvoiceBuilder::new()
                .with_currency(currency)
                .with_amounts(cents(subtotal), cents(tax));
            let purchase = PurchaseInvoiceBuilder::new()
                .with_currency(currency)
                .with_amounts(cents(subtotal), cents(tax));

            for event in [sale.clone().posted(), purchase.posted()] {
                let outcome = fx.ledger.posting().post_event(fx.company, &event).await.unwrap();
                let entry = fx
                    .ledger
                    .journal()
                    .get(fx.company, outcome.entry_id().unwrap())
                    .await
                    .unwrap();
                assert_entry_balanced(&entry);
                assert!(entry.lines.iter().all(|l| l.fx_rate == rate && l.amount_base > 0));
            }

            fx.ledger
                .posting()
                .post_event(fx.company, &sale.cancelled(DateFixtures::later_in_january()))
                .await
                .unwrap();
            let (from, to) = january();
            let tb = fx.ledger.projector().trial_balance(fx.company, from, to).await.unwrap();
            assert!(tb.is_balanced);
            assert!(tb.row("120").is_none());
            assert!(tb.row("600").is_none());
        });
    }
}
