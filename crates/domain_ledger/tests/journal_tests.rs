//! Journal lifecycle, projections and ledger-wide properties

use proptest::prelude::*;
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{Currency, DateRange, Money};
use domain_ledger::{
    AccountType, EntryStatus, LedgerError, LineDraft, NewEntry, ProjectionOptions,
};
use test_utils::{
    assert_entry_balanced, assert_mirror, assert_trial_balance_row, balanced_amounts_strategy,
    unbalanced_amounts_strategy, DateFixtures, LedgerFixtures, MoneyFixtures, SaleInvoiceBuilder,
    SeededLedger,
};

fn lira_minor(minor: i64) -> Money {
    Money::from_minor(minor, Currency::TRY)
}

async fn opening_entry(fx: &SeededLedger, amount: rust_decimal::Decimal) -> NewEntry {
    NewEntry::new("Opening capital", DateFixtures::invoice_date())
        .debit(fx.account("100").await, MoneyFixtures::lira(amount))
        .credit(fx.account("500").await, MoneyFixtures::lira(amount))
}

// ============================================================================
// Draft lifecycle
// ============================================================================

mod draft_tests {
    use super::*;

    #[tokio::test]
    async fn test_draft_is_invisible_until_posted() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let id = journal
            .create_draft(fx.company, opening_entry(&fx, dec!(5000)).await)
            .await
            .unwrap();

        let draft = journal.get(fx.company, id).await.unwrap();
        assert_eq!(draft.entry.status, EntryStatus::Draft);
        assert!(draft.entry.posted_at.is_none());

        let tb = fx
            .ledger
            .projector()
            .trial_balance(fx.company, DateFixtures::year_start(), DateFixtures::year_end())
            .await
            .unwrap();
        assert!(tb.rows.is_empty());

        journal.post(fx.company, id).await.unwrap();
        let posted = journal.get(fx.company, id).await.unwrap();
        assert_eq!(posted.entry.status, EntryStatus::Posted);
        assert!(posted.entry.posted_at.is_some());
        assert_entry_balanced(&posted);
        assert_eq!(posted.entry.number, draft.entry.number);
    }

    #[tokio::test]
    async fn test_unbalanced_draft_can_be_saved_but_not_posted() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let entry = NewEntry::new("Work in progress", DateFixtures::invoice_date())
            .debit(fx.account("100").await, MoneyFixtures::lira(dec!(100)))
            .credit(fx.account("500").await, MoneyFixtures::lira(dec!(90)));

        let id = journal.create_draft(fx.company, entry).await.unwrap();
        let result = journal.post(fx.company, id).await;
        assert!(matches!(result, Err(LedgerError::Imbalance { .. })));

        let fixed = opening_entry(&fx, dec!(100)).await;
        journal.update_draft(fx.company, id, fixed).await.unwrap();
        journal.post(fx.company, id).await.unwrap();
    }

    #[tokio::test]
    async fn test_posted_entry_is_immutable() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let id = journal
            .post_direct(fx.company, opening_entry(&fx, dec!(100)).await)
            .await
            .unwrap();

        let update = journal
            .update_draft(fx.company, id, opening_entry(&fx, dec!(200)).await)
            .await;
        assert!(matches!(update, Err(LedgerError::State(_))));
        assert!(matches!(journal.delete_draft(fx.company, id).await, Err(LedgerError::State(_))));
        assert!(matches!(journal.post(fx.company, id).await, Err(LedgerError::State(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_draft_edit_racing_post_never_commits_mixed_lines() {
        for _ in 0..20 {
            let fx = Arc::new(LedgerFixtures::seeded().await);
            let id = fx
                .ledger
                .journal()
                .create_draft(fx.company, opening_entry(&fx, dec!(100)).await)
                .await
                .unwrap();
            let skewed = NewEntry::new("Opening capital", DateFixtures::invoice_date())
                .debit(fx.account("100").await, MoneyFixtures::lira(dec!(100)))
                .credit(fx.account("500").await, MoneyFixtures::lira(dec!(90)));

            let poster = {
                let fx = Arc::clone(&fx);
                tokio::spawn(async move { fx.ledger.journal().post(fx.company, id).await })
            };
            let editor = {
                let fx = Arc::clone(&fx);
                tokio::spawn(async move { fx.ledger.journal().update_draft(fx.company, id, skewed).await })
            };
            let posted = poster.await.unwrap();
            let edited = editor.await.unwrap();

            let stored = fx.ledger.journal().get(fx.company, id).await.unwrap();
            match (posted, edited) {
                (Ok(()), Err(LedgerError::State(_))) => {
                    assert_eq!(stored.entry.status, EntryStatus::Posted);
                    assert_entry_balanced(&stored);
                    assert_eq!(stored.entry.total_debit, 10000);
                }
                (Err(LedgerError::Imbalance { .. }), Ok(())) => {
                    assert_eq!(stored.entry.status, EntryStatus::Draft);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_deleted_draft_is_gone() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let id = journal
            .create_draft(fx.company, opening_entry(&fx, dec!(100)).await)
            .await
            .unwrap();

        journal.delete_draft(fx.company, id).await.unwrap();
        assert!(matches!(journal.get(fx.company, id).await, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_inactive_account_rejected() {
        let fx = LedgerFixtures::seeded().await;
        let capital = fx.account("500").await;
        let entry = opening_entry(&fx, dec!(100)).await;
        fx.ledger.chart().deactivate(fx.company, capital).await.unwrap();

        let result = fx.ledger.journal().post_direct(fx.company, entry).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_entry_numbers_restart_per_year() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let cash = fx.account("100").await;
        let capital = fx.account("500").await;

        let mut numbers = Vec::new();
        for date in [
            DateFixtures::invoice_date(),
            DateFixtures::february(),
            DateFixtures::date(2025, 1, 2),
        ] {
            let entry = NewEntry::new("Capital", date)
                .debit(cash, MoneyFixtures::try_1000())
                .credit(capital, MoneyFixtures::try_1000());
            let id = journal.post_direct(fx.company, entry).await.unwrap();
            numbers.push(journal.get(fx.company, id).await.unwrap().entry.number);
        }
        assert_eq!(numbers, vec!["JV-2024-000001", "JV-2024-000002", "JV-2025-000001"]);
    }
}

// ============================================================================
// Reversal
// ============================================================================

mod reversal_tests {
    use super::*;

    #[tokio::test]
    async fn test_reversal_mirrors_and_marks_original() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let id = journal
            .post_direct(fx.company, opening_entry(&fx, dec!(750)).await)
            .await
            .unwrap();

        let reversal_id = journal
            .reverse(fx.company, id, Some(DateFixtures::invoice_date()))
            .await
            .unwrap();

        let original = journal.get(fx.company, id).await.unwrap();
        let reversal = journal.get(fx.company, reversal_id).await.unwrap();
        assert_eq!(original.entry.status, EntryStatus::Reversed);
        assert_eq!(original.entry.reversed_by, Some(reversal_id));
        assert_eq!(reversal.entry.status, EntryStatus::Posted);
        assert_eq!(reversal.entry.date, original.entry.date);
        assert_eq!(
            reversal.entry.description,
            format!("Reversal of {}", original.entry.number)
        );
        assert_mirror(&original, &reversal);
        assert_entry_balanced(&reversal);
    }

    #[tokio::test]
    async fn test_reverse_twice_is_rejected() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let id = journal
            .post_direct(fx.company, opening_entry(&fx, dec!(10)).await)
            .await
            .unwrap();

        journal.reverse(fx.company, id, None).await.unwrap();
        assert!(matches!(
            journal.reverse(fx.company, id, Some(DateFixtures::later_in_january())).await,
            Err(LedgerError::State(_))
        ));
    }

    #[tokio::test]
    async fn test_reversal_respects_lock_of_reversal_date() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let id = journal
            .post_direct(fx.company, opening_entry(&fx, dec!(10)).await)
            .await
            .unwrap();
        fx.ledger.periods().lock(fx.company, 2024, 1, "controller").await.unwrap();

        let locked = journal
            .reverse(fx.company, id, Some(DateFixtures::later_in_january()))
            .await;
        assert!(matches!(locked, Err(ref e) if e.is_period_locked()));
        assert_eq!(
            journal.get(fx.company, id).await.unwrap().entry.status,
            EntryStatus::Posted
        );

        let reversal_id = journal
            .reverse(fx.company, id, Some(DateFixtures::february()))
            .await
            .unwrap();
        let reversal = journal.get(fx.company, reversal_id).await.unwrap();
        assert_eq!(reversal.entry.date, DateFixtures::february());
    }

    #[tokio::test]
    async fn test_reversed_invoice_can_be_posted_again() {
        let fx = LedgerFixtures::seeded().await;
        let event = SaleInvoiceBuilder::new().posted();
        let first = fx.ledger.posting().post_event(fx.company, &event).await.unwrap();

        fx.ledger
            .journal()
            .reverse(fx.company, first.entry_id().unwrap(), None)
            .await
            .unwrap();
        fx.ledger.posting().post_event(fx.company, &event).await.unwrap();
    }
}

// ============================================================================
// Projections
// ============================================================================

mod projection_tests {
    use super::*;

    #[tokio::test]
    async fn test_general_ledger_order_and_running_balance() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let cash = fx.account("100").await;
        let capital = fx.account("500").await;
        let revenue = fx.account("600").await;

        // Posted out of date order on purpose
        journal
            .post_direct(
                fx.company,
                NewEntry::new("Later sale", DateFixtures::later_in_january())
                    .debit(cash, MoneyFixtures::lira(dec!(300)))
                    .credit(revenue, MoneyFixtures::lira(dec!(300))),
            )
            .await
            .unwrap();
        journal
            .post_direct(
                fx.company,
                NewEntry::new("Capital", DateFixtures::invoice_date())
                    .debit(cash, MoneyFixtures::lira(dec!(1000)))
                    .credit(capital, MoneyFixtures::lira(dec!(1000))),
            )
            .await
            .unwrap();
        journal
            .post_direct(
                fx.company,
                NewEntry::new("Petty cash out", DateFixtures::later_in_january())
                    .debit(capital, MoneyFixtures::lira(dec!(50)))
                    .line(
                        LineDraft::credit(cash, MoneyFixtures::lira(dec!(50)))
                            .with_description("Refund"),
                    ),
            )
            .await
            .unwrap();

        let rows = fx
            .ledger
            .projector()
            .general_ledger(fx.company, cash, DateFixtures::year_start(), DateFixtures::year_end())
            .await
            .unwrap();

        let descriptions: Vec<_> = rows.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Capital", "Later sale", "Refund"]);
        let running: Vec<_> = rows.iter().map(|r| r.running_balance.amount()).collect();
        assert_eq!(running, vec![dec!(1000), dec!(1300), dec!(1250)]);
        assert!(rows.iter().all(|r| r.original.is_none()));

        let statement = fx
            .ledger
            .projector()
            .account_statement(fx.company, cash, DateFixtures::year_start(), DateFixtures::year_end())
            .await
            .unwrap();
        assert_eq!(statement.account.code, "100");
        assert_eq!(statement.summary.total_debit.amount(), dec!(1300));
        assert_eq!(statement.summary.total_credit.amount(), dec!(50));
        assert_eq!(statement.summary.final_balance.amount(), dec!(1250));
    }

    #[tokio::test]
    async fn test_range_excludes_other_periods() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let cash = fx.account("100").await;
        let capital = fx.account("500").await;
        for date in [DateFixtures::invoice_date(), DateFixtures::february()] {
            journal
                .post_direct(
                    fx.company,
                    NewEntry::new("Capital", date)
                        .debit(cash, MoneyFixtures::try_1000())
                        .credit(capital, MoneyFixtures::try_1000()),
                )
                .await
                .unwrap();
        }

        let tb = fx
            .ledger
            .projector()
            .trial_balance(fx.company, DateFixtures::february(), DateFixtures::date(2024, 2, 29))
            .await
            .unwrap();
        assert_trial_balance_row(&tb, "100", dec!(1000), dec!(0));
        assert_trial_balance_row(&tb, "500", dec!(0), dec!(1000));
    }

    #[tokio::test]
    async fn test_include_reversed_toggle() {
        let fx = LedgerFixtures::seeded().await;
        let journal = fx.ledger.journal();
        let cash = fx.account("100").await;
        let kept = journal
            .post_direct(fx.company, opening_entry(&fx, dec!(100)).await)
            .await
            .unwrap();
        let undone = journal
            .post_direct(fx.company, opening_entry(&fx, dec!(40)).await)
            .await
            .unwrap();
        journal
            .reverse(fx.company, undone, Some(DateFixtures::later_in_january()))
            .await
            .unwrap();

        let projector = fx.ledger.projector();
        let (from, to) = (DateFixtures::year_start(), DateFixtures::year_end());

        let all = projector.general_ledger(fx.company, cash, from, to).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.last().unwrap().running_balance.amount(), dec!(100));

        let options = ProjectionOptions {
            include_reversed: false,
        };
        let clean = projector
            .general_ledger_with(fx.company, cash, from, to, options)
            .await
            .unwrap();
        assert_eq!(clean.len(), 1);
        assert_eq!(clean[0].entry_id, kept);

        let tb_all = projector.trial_balance(fx.company, from, to).await.unwrap();
        let tb_clean = projector.trial_balance_with(fx.company, from, to, options).await.unwrap();
        assert_eq!(tb_all.rows, tb_clean.rows);
    }

    #[tokio::test]
    async fn test_foreign_lines_show_original_amount() {
        let fx = LedgerFixtures::seeded().await;
        let event = SaleInvoiceBuilder::new()
            .with_currency(Currency::USD)
            .with_amounts(dec!(10), dec!(0))
            .posted();
        fx.ledger.posting().post_event(fx.company, &event).await.unwrap();

        let receivable = fx.account("120").await;
        let rows = fx
            .ledger
            .projector()
            .general_ledger(fx.company, receivable, DateFixtures::year_start(), DateFixtures::year_end())
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].debit.amount(), dec!(324.57));
        let (original, rate) = rows[0].original.unwrap();
        assert_eq!(original, Money::new(dec!(10), Currency::USD));
        assert_eq!(rate, MoneyFixtures::usd_rate());
    }

    #[tokio::test]
    async fn test_unknown_account_and_bad_range() {
        let fx = LedgerFixtures::seeded().await;
        let projector = fx.ledger.projector();

        let unknown = projector
            .general_ledger(
                fx.company,
                core_kernel::AccountId::new(),
                DateFixtures::year_start(),
                DateFixtures::year_end(),
            )
            .await;
        assert!(matches!(unknown, Err(LedgerError::NotFound(_))));

        let inverted = projector
            .trial_balance(fx.company, DateFixtures::year_end(), DateFixtures::year_start())
            .await;
        assert!(matches!(inverted, Err(LedgerError::Validation(_))));
    }
}

// ============================================================================
// Chart maintenance against the journal
// ============================================================================

mod chart_tests {
    use super::*;

    #[tokio::test]
    async fn test_used_account_cannot_be_deleted() {
        let fx = LedgerFixtures::seeded().await;
        fx.ledger
            .journal()
            .post_direct(fx.company, opening_entry(&fx, dec!(10)).await)
            .await
            .unwrap();

        let cash = fx.account("100").await;
        let result = fx.ledger.chart().delete(fx.company, cash).await;
        assert!(matches!(result, Err(LedgerError::InUse(_))));
    }

    #[tokio::test]
    async fn test_new_subaccount_is_postable() {
        let fx = LedgerFixtures::seeded().await;
        let bank = fx.account("102").await;
        let sub = fx
            .ledger
            .chart()
            .create(fx.company, "102.01", "Main Bank", AccountType::Asset, Some(bank))
            .await
            .unwrap();

        let entry = NewEntry::new("Deposit", DateFixtures::invoice_date())
            .debit(sub.id, MoneyFixtures::lira(dec!(80)))
            .credit(fx.account("500").await, MoneyFixtures::lira(dec!(80)));
        fx.ledger.journal().post_direct(fx.company, entry).await.unwrap();

        let tb = fx
            .ledger
            .projector()
            .trial_balance(fx.company, DateFixtures::year_start(), DateFixtures::year_end())
            .await
            .unwrap();
        assert_trial_balance_row(&tb, "102.01", dec!(80), dec!(0));
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

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_balanced_entries_post_and_net_to_zero(amounts in balanced_amounts_strategy()) {
        runtime().block_on(async {
            let fx = LedgerFixtures::seeded().await;
            let debit_account = fx.account("100").await;
            let credit_account = fx.account("500").await;

            let mut entry = NewEntry::new("Generated", DateFixtures::invoice_date());
            for amount in &amounts.debits {
                entry = entry.debit(debit_account, lira_minor(*amount));
            }
            for amount in &amounts.credits {
                entry = entry.credit(credit_account, lira_minor(*amount));
            }

            let id = fx.ledger.journal().post_direct(fx.company, entry).await.unwrap();
            let stored = fx.ledger.journal().get(fx.company, id).await.unwrap();
            assert_entry_balanced(&stored);
            assert_eq!(stored.entry.total_debit, amounts.total());

            let reversal = fx
                .ledger
                .journal()
                .reverse(fx.company, id, Some(DateFixtures::invoice_date()))
                .await
                .unwrap();
            let reversal = fx.ledger.journal().get(fx.company, reversal).await.unwrap();
            assert_mirror(&stored, &reversal);

            let tb = fx
                .ledger
                .projector()
                .trial_balance(fx.company, DateFixtures::year_start(), DateFixtures::year_end())
                .await
                .unwrap();
            assert!(tb.rows.is_empty());
        });
    }

    #[test]
    fn prop_unbalanced_entries_never_persist(amounts in unbalanced_amounts_strategy()) {
        runtime().block_on(async {
            let fx = LedgerFixtures::seeded().await;
            let debit_account = fx.account("100").await;
            let credit_account = fx.account("500").await;

            let mut entry = NewEntry::new("Generated", DateFixtures::invoice_date());
            for amount in &amounts.debits {
                entry = entry.debit(debit_account, lira_minor(*amount));
            }
            for amount in &amounts.credits {
                entry = entry.credit(credit_account, lira_minor(*amount));
            }

            let result = fx.ledger.journal().post_direct(fx.company, entry).await;
            assert!(matches!(result, Err(LedgerError::Imbalance { .. })));

            let entries = fx
                .ledger
                .journal()
                .entries(fx.company, DateRange::all_time(), None)
                .await
                .unwrap();
            assert!(entries.is_empty());
        });
    }

    #[test]
    fn prop_sale_trial_balance_sums_match(subtotal in 1i64..10_000_000i64, tax in 0i64..2_000_000i64) {
        runtime().block_on(async {
            let fx = LedgerFixtures::seeded().await;
            let event = SaleInvoiceBuilder::new()
                .with_amounts(lira_minor(subtotal).amount(), lira_minor(tax).amount())
                .posted();
            fx.ledger.posting().post_event(fx.company, &event).await.unwrap();

            let tb = fx
                .ledger
                .projector()
                .trial_balance(fx.company, DateFixtures::year_start(), DateFixtures::year_end())
                .await
                .unwrap();
            assert!(tb.is_balanced);
            assert_eq!(tb.total_debit.to_minor().unwrap(), subtotal + tax);
        });
    }
}
