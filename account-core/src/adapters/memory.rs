//! In-memory repository implementation

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::Account;
use crate::ports::AccountRepository;

/// Process-local account store
///
/// A single mutex guards the map, which makes the email check and the
/// write in `commit` one atomic step.
#[derive(Default)]
pub struct MemoryRepository {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Account>>> {
        self.accounts
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

impl AccountRepository for MemoryRepository {
    fn commit(&self, account: &Account) -> Result<Uuid> {
        let mut accounts = self.lock()?;

        let taken = accounts
            .values()
            .any(|stored| stored.email() == account.email() && stored.id() != account.id());
        if taken {
            return Err(Error::conflict(format!(
                "email already registered: {}",
                account.email()
            )));
        }

        let id = match account.id() {
            Some(id) if accounts.contains_key(&id) => id,
            Some(id) => return Err(Error::not_found(format!("account {}", id))),
            None => Uuid::new_v4(),
        };

        accounts.insert(id, account.persisted_copy(id));
        debug!(account_id = %id, "account committed");
        Ok(id)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let email = email.trim().to_lowercase();
        let accounts = self.lock()?;
        Ok(accounts.values().find(|a| a.email() == email).cloned())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let accounts = self.lock()?;
        Ok(accounts.get(&id).cloned())
    }

    fn remove(&self, account: &Account) -> Result<()> {
        let id = account
            .id()
            .ok_or_else(|| Error::not_found("account has no id"))?;
        let mut accounts = self.lock()?;
        accounts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("account {}", id)))
    }

    fn list(&self) -> Result<Vec<Account>> {
        let accounts = self.lock()?;
        let mut all: Vec<Account> = accounts.values().cloned().collect();
        all.sort_by(|a, b| a.email().cmp(b.email()));
        Ok(all)
    }

    fn clear_all(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}
