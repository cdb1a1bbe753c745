//! Chart of accounts service
//!
//! Resolution by code is cached per ledger and the cache is dropped on every
//! chart write. A lookup that raced a write is not cached. Writes hold the ledger's writer guard so an account cannot be
//! deactivated or deleted while a posting that references it is committing.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use core_kernel::{AccountId, LedgerId};

use crate::account::{validate_code, Account, AccountType, StandardAccount};
use crate::error::LedgerError;
use crate::store::{LedgerStore, StoreError};
use crate::writers::LedgerWriters;

/// Resolved accounts by code, with a generation per ledger bumped on writes
#[derive(Debug, Default)]
struct CodeCache {
    accounts: HashMap<(LedgerId, String), Account>,
    generations: HashMap<LedgerId, u64>,
}

impl CodeCache {
    fn get(&self, ledger: LedgerId, code: &str) -> Option<&Account> {
        self.accounts.get(&(ledger, code.to_string()))
    }

    fn generation(&self, ledger: LedgerId) -> u64 {
        self.generations.get(&ledger).copied().unwrap_or(0)
    }

    /// Caches the account unless the ledger was written since `generation`
    fn insert_if_current(&mut self, ledger: LedgerId, generation: u64, account: Account) -> bool {
        if self.generation(ledger) != generation {
            return false;
        }
        self.accounts.insert((ledger, account.code.clone()), account);
        true
    }

    fn invalidate(&mut self, ledger: LedgerId) {
        self.accounts.retain(|(l, _), _| *l != ledger);
        *self.generations.entry(ledger).or_default() += 1;
    }
}

/// Registry of accounts per ledger
pub struct ChartOfAccounts {
    store: Arc<dyn LedgerStore>,
    writers: Arc<LedgerWriters>,
    cache: RwLock<CodeCache>,
}

impl ChartOfAccounts {
    pub fn new(store: Arc<dyn LedgerStore>, writers: Arc<LedgerWriters>) -> Self {
        Self {
            store,
            writers,
            cache: RwLock::new(CodeCache::default()),
        }
    }

    /// Finds the active account with the given code
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no active account has that code.
    pub async fn resolve(&self, ledger: LedgerId, code: &str) -> Result<Account, LedgerError> {
        let generation = {
            let cache = self.cache.read().await;
            if let Some(account) = cache.get(ledger, code) {
                return Ok(account.clone());
            }
            cache.generation(ledger)
        };

        let account = self
            .store
            .find_account_by_code(ledger, code)
            .await?
            .filter(|a| a.is_active)
            .ok_or_else(|| LedgerError::not_found("active account with code", code))?;

        if !self.cache.write().await.insert_if_current(ledger, generation, account.clone()) {
            debug!(%code, "Chart changed during lookup; not caching");
        }
        Ok(account)
    }

    /// Gets an account by ID, active or not
    pub async fn get(&self, ledger: LedgerId, id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .get_account(ledger, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    /// All accounts of a ledger ordered by code
    pub async fn list(&self, ledger: LedgerId) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.list_accounts(ledger).await?)
    }

    /// Direct children of an account ordered by code
    pub async fn children(&self, ledger: LedgerId, id: AccountId) -> Result<Vec<Account>, LedgerError> {
        self.get(ledger, id).await?;
        Ok(self
            .store
            .list_accounts(ledger)
            .await?
            .into_iter()
            .filter(|a| a.parent_id == Some(id))
            .collect())
    }

    /// Creates an account
    ///
    /// # Arguments
    ///
    /// * `ledger` - Owning ledger
    /// * `code` - Unique code within the ledger
    /// * `name` - Display name
    /// * `account_type` - Type, which fixes the natural balance side
    /// * `parent_id` - Optional active parent in the same ledger
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` if the code exists, `Validation` for a malformed
    /// code, an empty name, or an unknown or inactive parent.
    #[instrument(skip(self, name), fields(ledger_id = %ledger))]
    pub async fn create(
        &self,
        ledger: LedgerId,
        code: &str,
        name: &str,
        account_type: AccountType,
        parent_id: Option<AccountId>,
    ) -> Result<Account, LedgerError> {
        validate_code(code)?;
        let name = validated_name(name)?;

        let _writer = self.writers.acquire(ledger).await;

        let mut account = Account::new(ledger, code, name, account_type);
        if let Some(parent_id) = parent_id {
            self.active_parent(ledger, parent_id).await?;
            account = account.with_parent(parent_id);
        }

        match self.store.insert_account(&account).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(LedgerError::Duplicate(format!("account code {}", code)))
            }
            Err(e) => return Err(e.into()),
        }
        self.invalidate(ledger).await;

        info!(code, account_type = %account_type, "Account created");
        Ok(account)
    }

    #[instrument(skip(self, name), fields(ledger_id = %ledger))]
    pub async fn rename(&self, ledger: LedgerId, id: AccountId, name: &str) -> Result<Account, LedgerError> {
        let name = validated_name(name)?;
        let _writer = self.writers.acquire(ledger).await;

        let mut account = self.get(ledger, id).await?;
        account.name = name.to_string();
        self.save(&account).await?;
        Ok(account)
    }

    /// Deactivates an account
    ///
    /// # Errors
    ///
    /// Returns `HasChildren` if any child account is still active.
    #[instrument(skip(self), fields(ledger_id = %ledger))]
    pub async fn deactivate(&self, ledger: LedgerId, id: AccountId) -> Result<Account, LedgerError> {
        let _writer = self.writers.acquire(ledger).await;

        let mut account = self.get(ledger, id).await?;
        if self.has_active_children(ledger, id).await? {
            return Err(LedgerError::HasChildren(account.code));
        }
        account.is_active = false;
        self.save(&account).await?;

        info!(code = %account.code, "Account deactivated");
        Ok(account)
    }

    /// Reactivates an account; its parent, if any, must be active
    #[instrument(skip(self), fields(ledger_id = %ledger))]
    pub async fn reactivate(&self, ledger: LedgerId, id: AccountId) -> Result<Account, LedgerError> {
        let _writer = self.writers.acquire(ledger).await;

        let mut account = self.get(ledger, id).await?;
        if let Some(parent_id) = account.parent_id {
            self.active_parent(ledger, parent_id).await?;
        }
        account.is_active = true;
        self.save(&account).await?;
        Ok(account)
    }

    /// Moves an account under a new parent, or to the top level
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the move would create a cycle or the parent is
    /// unknown or inactive.
    #[instrument(skip(self), fields(ledger_id = %ledger))]
    pub async fn reparent(
        &self,
        ledger: LedgerId,
        id: AccountId,
        parent_id: Option<AccountId>,
    ) -> Result<Account, LedgerError> {
        let _writer = self.writers.acquire(ledger).await;

        let mut account = self.get(ledger, id).await?;
        if let Some(parent_id) = parent_id {
            self.active_parent(ledger, parent_id).await?;
            self.ensure_acyclic(ledger, id, parent_id).await?;
        }
        account.parent_id = parent_id;
        self.save(&account).await?;
        Ok(account)
    }

    /// Deletes an account that has never been used
    ///
    /// # Errors
    ///
    /// Returns `HasChildren` if active children exist and `InUse` if any
    /// journal line references the account. Inactive children move up to
    /// the deleted account's parent.
    #[instrument(skip(self), fields(ledger_id = %ledger))]
    pub async fn delete(&self, ledger: LedgerId, id: AccountId) -> Result<(), LedgerError> {
        let _writer = self.writers.acquire(ledger).await;

        let account = self.get(ledger, id).await?;
        if self.has_active_children(ledger, id).await? {
            return Err(LedgerError::HasChildren(account.code));
        }
        if self.store.account_in_use(ledger, id).await? {
            return Err(LedgerError::InUse(account.code));
        }

        match self.store.delete_account(ledger, id).await {
            Ok(()) => {}
            Err(StoreError::InUse(_)) => return Err(LedgerError::InUse(account.code)),
            Err(e) => return Err(e.into()),
        }
        self.invalidate(ledger).await;

        info!(code = %account.code, "Account deleted");
        Ok(())
    }

    /// Creates every account of a standard chart that is not present yet
    ///
    /// Returns the number of accounts created.
    pub async fn seed(&self, ledger: LedgerId, chart: &[StandardAccount]) -> Result<usize, LedgerError> {
        let mut created = 0;
        for template in chart {
            if self.store.find_account_by_code(ledger, template.code).await?.is_some() {
                continue;
            }
            let parent_id = match template.parent_code {
                Some(code) => Some(self.resolve(ledger, code).await?.id),
                None => None,
            };
            self.create(ledger, template.code, template.name, template.account_type, parent_id)
                .await?;
            created += 1;
        }
        debug!(ledger_id = %ledger, created, "Standard chart seeded");
        Ok(created)
    }

    async fn save(&self, account: &Account) -> Result<(), LedgerError> {
        self.store.update_account(account).await?;
        self.invalidate(account.ledger_id).await;
        Ok(())
    }

    async fn invalidate(&self, ledger: LedgerId) {
        self.cache.write().await.invalidate(ledger);
    }

    async fn active_parent(&self, ledger: LedgerId, parent_id: AccountId) -> Result<Account, LedgerError> {
        let parent = self
            .store
            .get_account(ledger, parent_id)
            .await?
            .ok_or_else(|| LedgerError::validation(format!("parent account {} does not exist", parent_id)))?;
        if !parent.is_active {
            return Err(LedgerError::validation(format!(
                "parent account {} is inactive",
                parent.code
            )));
        }
        Ok(parent)
    }

    async fn has_active_children(&self, ledger: LedgerId, id: AccountId) -> Result<bool, LedgerError> {
        Ok(self
            .store
            .list_accounts(ledger)
            .await?
            .iter()
            .any(|a| a.parent_id == Some(id) && a.is_active))
    }

    /// Walks up from the proposed parent; reaching `id` means a cycle
    async fn ensure_acyclic(
        &self,
        ledger: LedgerId,
        id: AccountId,
        parent_id: AccountId,
    ) -> Result<(), LedgerError> {
        let parents: HashMap<AccountId, Option<AccountId>> = self
            .store
            .list_accounts(ledger)
            .await?
            .into_iter()
            .map(|a| (a.id, a.parent_id))
            .collect();

        let mut cursor = Some(parent_id);
        let mut steps = 0;
        while let Some(current) = cursor {
            if current == id || steps > parents.len() {
                return Err(LedgerError::validation(format!(
                    "moving account {} under {} would create a cycle",
                    id, parent_id
                )));
            }
            cursor = parents.get(&current).copied().flatten();
            steps += 1;
        }
        Ok(())
    }
}

fn validated_name(name: &str) -> Result<&str, LedgerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("account name must not be empty"));
    }
    Ok(name)
}
