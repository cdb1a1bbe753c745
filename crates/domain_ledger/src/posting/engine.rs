//! Posting rule engine
//!
//! Turns a [`LedgerEvent`] into one balanced journal entry. Account roles and
//! exchange rates are all resolved before the journal engine is called, so a
//! configuration or rate failure leaves nothing written. Foreign lines carry
//! precomputed base amounts; a cancellation copies them from the posted
//! original.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_kernel::{AccountId, JournalEntryId, LedgerId, Money};

use crate::chart::ChartOfAccounts;
use crate::currency::CurrencyConverter;
use crate::engine::JournalEngine;
use crate::error::LedgerError;
use crate::journal::{EntryStatus, LineDraft, NewEntry, Side, SourceRef};
use crate::posting::events::LedgerEvent;
use crate::posting::roles::{CashClassification, RoleMap};
use crate::posting::templates::{self, AccountRef, Template, TemplateLine};
use crate::store::{EntryQuery, LedgerStore};

/// Result of processing one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostingOutcome {
    /// A POSTED entry was written
    Posted { entry_id: JournalEntryId },
    /// The event books nothing
    Skipped { reason: String },
}

impl PostingOutcome {
    pub fn entry_id(&self) -> Option<JournalEntryId> {
        match self {
            PostingOutcome::Posted { entry_id } => Some(*entry_id),
            PostingOutcome::Skipped { .. } => None,
        }
    }
}

/// Maps business events to journal entries
pub struct PostingRuleEngine {
    journal: Arc<JournalEngine>,
    chart: Arc<ChartOfAccounts>,
    store: Arc<dyn LedgerStore>,
    converter: CurrencyConverter,
    roles: RoleMap,
    cash_classification: CashClassification,
}

impl PostingRuleEngine {
    pub fn new(
        journal: Arc<JournalEngine>,
        chart: Arc<ChartOfAccounts>,
        store: Arc<dyn LedgerStore>,
        converter: CurrencyConverter,
        roles: RoleMap,
        cash_classification: CashClassification,
    ) -> Self {
        Self {
            journal,
            chart,
            store,
            converter,
            roles,
            cash_classification,
        }
    }

    /// Derives and posts the entry for an event
    ///
    /// # Errors
    ///
    /// - `Configuration` if a role is unmapped or maps to no active account
    /// - `RateUnavailable` if a foreign document has no rate for its date
    /// - `State` if a cancellation has no posted original
    /// - `Validation` if a cancellation's amounts differ from the original
    /// - `Duplicate` if the event was already posted
    /// - any journal engine error (`Imbalance`, `PeriodLocked`, ...)
    #[instrument(skip(self, event), fields(ledger_id = %ledger, event = event.kind()))]
    pub async fn post_event(&self, ledger: LedgerId, event: &LedgerEvent) -> Result<PostingOutcome, LedgerError> {
        let result = self.derive_and_post(ledger, event).await;
        match &result {
            Ok(PostingOutcome::Posted { entry_id }) => {
                info!(%entry_id, source = %event.source(), "Event posted");
            }
            Ok(PostingOutcome::Skipped { reason }) => {
                info!(%reason, "Event skipped");
            }
            Err(err) => {
                warn!(error = %err, source = %event.source(), "Event posting failed");
            }
        }
        result
    }

    async fn derive_and_post(&self, ledger: LedgerId, event: &LedgerEvent) -> Result<PostingOutcome, LedgerError> {
        let Some(template) = templates::for_event(event, &self.cash_classification)? else {
            return Ok(PostingOutcome::Skipped {
                reason: "counted quantity matches recorded quantity".to_string(),
            });
        };

        let entry = match event.cancels() {
            Some(original) => self.cancellation(ledger, event, original, &template).await?,
            None => self.from_template(ledger, event, template).await?,
        };

        let entry_id = self.journal.post_direct(ledger, entry).await?;
        Ok(PostingOutcome::Posted { entry_id })
    }

    async fn from_template(
        &self,
        ledger: LedgerId,
        event: &LedgerEvent,
        template: Template,
    ) -> Result<NewEntry, LedgerError> {
        let rate = self.converter.rate(event.currency(), event.rate_date()).await?;
        let foreign = event.currency() != self.converter.base_currency();
        let bases = if foreign {
            self.balanced_bases(&template.lines, rate)?
        } else {
            Vec::new()
        };

        let mut entry = NewEntry::new(template.description, event.entry_date()).with_source(event.source());
        for (index, line) in template.lines.into_iter().enumerate() {
            let account = self.resolve(ledger, &line.account).await?;
            let mut draft = LineDraft::on_side(line.side, account, line.amount);
            if let Some(base) = bases.get(index) {
                draft = draft.with_fx_rate(rate).with_base_amount(*base);
            }
            entry = entry.line(draft);
        }
        Ok(entry)
    }

    /// Converts each leg and books the rounding residue on the aggregate leg
    ///
    /// The aggregate is the largest line on the side with fewer lines, the
    /// receivable or payable of an invoice.
    fn balanced_bases(&self, lines: &[TemplateLine], rate: Decimal) -> Result<Vec<Money>, LedgerError> {
        let base = self.converter.base_currency();
        let mut minors = Vec::with_capacity(lines.len());
        for line in lines {
            minors.push(self.converter.convert(line.amount, rate)?.base.to_minor()?);
        }

        let side_total = |side: Side| -> i64 {
            lines
                .iter()
                .zip(&minors)
                .filter(|(l, _)| l.side == side)
                .map(|(_, m)| *m)
                .sum()
        };
        let count = |side: Side| lines.iter().filter(|l| l.side == side).count();
        let aggregate_side = if count(Side::Debit) < count(Side::Credit) {
            Side::Debit
        } else {
            Side::Credit
        };
        let residue = side_total(aggregate_side.opposite()) - side_total(aggregate_side);

        if residue != 0 {
            let aggregate = lines
                .iter()
                .enumerate()
                .filter(|(_, l)| l.side == aggregate_side)
                .max_by_key(|(_, l)| l.amount.amount())
                .map(|(index, _)| index)
                .ok_or_else(|| LedgerError::validation("template has lines on one side only"))?;
            minors[aggregate] += residue;
            if minors[aggregate] <= 0 {
                return Err(LedgerError::validation(format!(
                    "rounding residue {} leaves no base amount on the aggregate line",
                    residue
                )));
            }
            debug!(residue, line = aggregate + 1, "Booked conversion residue on aggregate line");
        }

        Ok(minors.into_iter().map(|m| Money::from_minor(m, base)).collect())
    }

    /// Mirrors the stored original line for line
    ///
    /// The payload only has to agree with what was posted; accounts, amounts
    /// and rates all come from the original entry.
    async fn cancellation(
        &self,
        ledger: LedgerId,
        event: &LedgerEvent,
        original: SourceRef,
        template: &Template,
    ) -> Result<NewEntry, LedgerError> {
        let posted = self
            .store
            .list_entries(
                ledger,
                &EntryQuery::new().with_source(original).with_status(EntryStatus::Posted),
            )
            .await?;
        let Some(header) = posted.first() else {
            return Err(LedgerError::state(format!(
                "cannot cancel {}: no posted entry exists",
                original
            )));
        };
        let stored = self.journal.get(ledger, header.id).await?;

        for side in [Side::Debit, Side::Credit] {
            let mut posted_total = Decimal::ZERO;
            for line in stored.lines.iter().filter(|l| l.side() == side.opposite()) {
                if line.currency != event.currency() {
                    return Err(LedgerError::validation(format!(
                        "cancellation of {} is in {} but the posted entry is in {}",
                        original,
                        event.currency(),
                        line.currency
                    )));
                }
                posted_total += line.amount().amount();
            }
            let requested = template.total(side)?;
            if requested != posted_total {
                let label = match side {
                    Side::Debit => "debits",
                    Side::Credit => "credits",
                };
                return Err(LedgerError::validation(format!(
                    "cancellation of {} {} {} do not match posted {}",
                    original, label, requested, posted_total
                )));
            }
        }

        let base = self.converter.base_currency();
        let mut entry = NewEntry::new(template.description.clone(), event.entry_date()).with_source(event.source());
        for line in &stored.lines {
            let mut draft = LineDraft::on_side(line.side().opposite(), line.account_id, line.amount())
                .with_base_amount(Money::from_minor(line.amount_base, base));
            if line.currency != base {
                draft = draft.with_fx_rate(line.fx_rate);
            }
            if let Some(description) = &line.description {
                draft = draft.with_description(description.clone());
            }
            entry = entry.line(draft);
        }
        Ok(entry)
    }

    async fn resolve(&self, ledger: LedgerId, account: &AccountRef) -> Result<AccountId, LedgerError> {
        let (code, label) = match account {
            AccountRef::Role(role) => {
                let code = self.roles.code_for(*role).ok_or_else(|| {
                    LedgerError::configuration(format!("no account mapped for role {}", role))
                })?;
                (code, format!("role {}", role))
            }
            AccountRef::Code(code) => (code.as_str(), "document override".to_string()),
        };

        match self.chart.resolve(ledger, code).await {
            Ok(account) => Ok(account.id),
            Err(LedgerError::NotFound(_)) => Err(LedgerError::configuration(format!(
                "{} references account {} which is not an active account of the chart",
                label, code
            ))),
            Err(e) => Err(e),
        }
    }
}
