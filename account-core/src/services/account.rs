//! Account service - load, mutate through the entity, commit

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, CredentialHandler};
use crate::ports::AccountRepository;

/// Account use cases over a repository
///
/// Every mutating call reloads the stored account, applies the change
/// through the entity so its checks run, and commits the result. A failed
/// check leaves the stored account untouched.
pub struct AccountService {
    repository: Arc<dyn AccountRepository>,
    credentials: CredentialHandler,
}

impl AccountService {
    pub fn new(repository: Arc<dyn AccountRepository>, credentials: CredentialHandler) -> Self {
        Self {
            repository,
            credentials,
        }
    }

    /// Create and commit a new account, optionally with a password
    pub fn register(&self, name: &str, email: &str, password: Option<&str>) -> Result<Account> {
        let mut account = Account::new(name, email)?;
        if let Some(password) = password {
            account.set_password_with(&self.credentials, password)?;
        }
        account.save(self.repository.as_ref())?;
        Ok(account)
    }

    pub fn get(&self, id: Uuid) -> Result<Account> {
        self.repository
            .find_by_id(id)?
            .ok_or_else(|| Error::not_found(format!("account {}", id)))
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.repository.find_by_email(email)
    }

    pub fn list(&self) -> Result<Vec<Account>> {
        self.repository.list()
    }

    /// Look up by email and check the password
    ///
    /// Unknown email, an account without a password and a wrong password
    /// all return `None`, so callers cannot tell which one happened.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<Account>> {
        let Some(account) = self.repository.find_by_email(email)? else {
            debug!("authentication failed: unknown email");
            return Ok(None);
        };
        if !account.has_password() {
            debug!(account_id = ?account.id(), "authentication failed: no password set");
            return Ok(None);
        }
        if account.check_password(password)? {
            Ok(Some(account))
        } else {
            warn!(account_id = ?account.id(), "authentication failed: wrong password");
            Ok(None)
        }
    }

    pub fn deposit(&self, id: Uuid, amount: Decimal) -> Result<Account> {
        self.update(id, |account| account.deposit(amount))
    }

    pub fn withdraw(&self, id: Uuid, amount: Decimal) -> Result<Account> {
        self.update(id, |account| account.withdraw(amount))
    }

    pub fn change_role(&self, id: Uuid, role: &str) -> Result<Account> {
        self.update(id, |account| account.change_role(role))
    }

    pub fn change_password(&self, id: Uuid, password: &str) -> Result<Account> {
        let credentials = &self.credentials;
        self.update(id, |account| account.set_password_with(credentials, password))
    }

    /// Delete a stored account; it can no longer be found afterwards
    pub fn delete(&self, id: Uuid) -> Result<Account> {
        let mut account = self.get(id)?;
        account.delete(self.repository.as_ref())?;
        Ok(account)
    }

    fn update<F>(&self, id: Uuid, change: F) -> Result<Account>
    where
        F: FnOnce(&mut Account) -> Result<()>,
    {
        let mut account = self.get(id)?;
        change(&mut account)?;
        account.save(self.repository.as_ref())?;
        Ok(account)
    }
}
