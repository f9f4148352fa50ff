//! Account domain model

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::credential::CredentialHandler;
use super::result::{Error, Result};
use super::role::Role;
use super::validation::{normalize_email, validate_positive_amount, validate_required};
use crate::ports::AccountRepository;

/// Lifecycle of an account with respect to durable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// Constructed in memory, never committed
    Transient,
    /// Committed and not deleted
    Active,
    /// Deleted; terminal
    Deleted,
}

/// Plain key-value view of an account, used by `to_dict`/`from_dict`
///
/// Credential material has no field here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A user account holding identity, balance and role
///
/// Fields are private so every change goes through a validating method.
#[derive(Clone)]
pub struct Account {
    id: Option<Uuid>,
    name: String,
    email: String,
    password_hash: Option<String>,
    balance: Decimal,
    role: Role,
    active: bool,
}

impl Account {
    /// Create a new transient account
    ///
    /// Starts with a zero balance, the default role and no password.
    pub fn new(name: &str, email: &str) -> Result<Self> {
        let email = validate_required(&[("name", name), ("email", email)])
            .and_then(|_| normalize_email(email))
            .map_err(|e| {
                debug!(error = e.kind(), "account construction rejected");
                e
            })?;

        Ok(Self {
            id: None,
            name: name.trim().to_string(),
            email,
            password_hash: None,
            balance: Decimal::ZERO,
            role: Role::default(),
            active: true,
        })
    }

    /// Rebuild an account that a repository has stored
    pub fn from_persistence(
        id: Uuid,
        name: &str,
        email: &str,
        balance: Decimal,
        role: Role,
        password_hash: Option<String>,
    ) -> Result<Self> {
        let mut account = Self::new(name, email)?;
        if balance < Decimal::ZERO {
            return Err(Error::validation(format!(
                "stored balance for account {} is negative",
                id
            )));
        }
        account.id = Some(id);
        account.balance = balance;
        account.role = role;
        account.password_hash = password_hash;
        Ok(account)
    }

    /// Copy of this account as a repository stores it under `id`
    pub(crate) fn persisted_copy(&self, id: Uuid) -> Self {
        Self {
            id: Some(id),
            active: true,
            ..self.clone()
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The stored PHC hash, if a password has been set
    pub fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn state(&self) -> AccountState {
        match (self.active, self.id) {
            (false, _) => AccountState::Deleted,
            (true, None) => AccountState::Transient,
            (true, Some(_)) => AccountState::Active,
        }
    }

    fn ensure_mutable(&self) -> Result<()> {
        if !self.active {
            return Err(Error::validation("account has been deleted"));
        }
        Ok(())
    }

    // === Balance ===

    pub fn deposit(&mut self, amount: Decimal) -> Result<()> {
        self.ensure_mutable()?;
        let balance = validate_positive_amount(amount)
            .and_then(|_| {
                self.balance
                    .checked_add(amount)
                    .ok_or_else(|| Error::validation("deposit would overflow the balance"))
            })
            .map_err(|e| {
                debug!(account_id = ?self.id, error = e.kind(), "deposit rejected");
                e
            })?;

        self.balance = balance;
        debug!(account_id = ?self.id, "deposit applied");
        Ok(())
    }

    pub fn withdraw(&mut self, amount: Decimal) -> Result<()> {
        self.ensure_mutable()?;
        let checked = validate_positive_amount(amount).and_then(|_| {
            if amount > self.balance {
                Err(Error::InsufficientFunds {
                    requested: amount,
                    available: self.balance,
                })
            } else {
                Ok(())
            }
        });
        if let Err(e) = checked {
            debug!(account_id = ?self.id, error = e.kind(), "withdrawal rejected");
            return Err(e);
        }

        self.balance -= amount;
        debug!(account_id = ?self.id, "withdrawal applied");
        Ok(())
    }

    // === Role ===

    pub fn change_role(&mut self, new_role: &str) -> Result<()> {
        self.ensure_mutable()?;
        let role: Role = new_role.parse()?;
        if role != self.role {
            info!(account_id = ?self.id, from = %self.role, to = %role, "role changed");
        }
        self.role = role;
        Ok(())
    }

    // === Credentials ===

    /// Hash and store a password using the default Argon2id parameters
    pub fn set_password(&mut self, plaintext: &str) -> Result<()> {
        self.set_password_with(&CredentialHandler::default(), plaintext)
    }

    /// Hash and store a password, replacing any previous hash
    pub fn set_password_with(&mut self, handler: &CredentialHandler, plaintext: &str) -> Result<()> {
        self.ensure_mutable()?;
        let hash = handler.hash(plaintext)?;
        self.password_hash = Some(hash);
        debug!(account_id = ?self.id, "password set");
        Ok(())
    }

    /// Verify a candidate password; a wrong guess returns `Ok(false)`
    pub fn check_password(&self, candidate: &str) -> Result<bool> {
        match &self.password_hash {
            Some(hash) => CredentialHandler::verify(candidate, hash),
            None => Err(Error::validation("no password has been set")),
        }
    }

    // === Persistence lifecycle ===

    /// Commit this account, assigning an id on first success
    ///
    /// A uniqueness conflict surfaces as `Error::Validation` and leaves the
    /// account untouched, so the caller can fix the email and retry.
    pub fn save<R: AccountRepository + ?Sized>(&mut self, repo: &R) -> Result<Uuid> {
        if !self.active {
            return Err(Error::validation("cannot save a deleted account"));
        }

        match repo.commit(self) {
            Ok(id) => {
                if self.id.is_none() {
                    info!(account_id = %id, "account created");
                }
                self.id = Some(id);
                Ok(id)
            }
            Err(Error::Conflict(msg)) => {
                warn!(
                    account_id = ?self.id,
                    error = "conflict",
                    "commit rejected: email already registered"
                );
                Err(Error::Validation(msg))
            }
            Err(Error::NotFound(msg)) => {
                warn!(
                    account_id = ?self.id,
                    error = "not_found",
                    "commit rejected: account is not stored"
                );
                Err(Error::Validation(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Remove this account from the repository
    ///
    /// Only a committed, active account can be deleted. Afterwards the
    /// account rejects every mutation.
    pub fn delete<R: AccountRepository + ?Sized>(&mut self, repo: &R) -> Result<()> {
        if !self.active {
            return Err(Error::validation("account is already deleted"));
        }
        let id = self
            .id
            .ok_or_else(|| Error::validation("account has not been committed"))?;

        match repo.remove(self) {
            Ok(()) => {}
            Err(Error::NotFound(msg)) => return Err(Error::Validation(msg)),
            Err(e) => return Err(e),
        }

        self.active = false;
        info!(account_id = %id, "account deleted");
        Ok(())
    }

    // === Serialization ===

    /// Flat key-value snapshot; never includes the password hash
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".to_string(), json!(self.id));
        map.insert("name".to_string(), json!(self.name));
        map.insert("email".to_string(), json!(self.email));
        map.insert("balance".to_string(), json!(self.balance));
        map.insert("role".to_string(), json!(self.role));
        map.insert("active".to_string(), json!(self.active));
        map
    }

    /// Rebuild an account from a `to_dict`-shaped mapping
    ///
    /// `name` and `email` are required; `id`, `balance`, `role` and `active`
    /// fall back to their defaults. Unknown keys are ignored.
    pub fn from_dict(map: &Map<String, Value>) -> Result<Self> {
        let snapshot: AccountSnapshot = serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| Error::validation(format!("malformed account data: {}", e)))?;
        Self::from_snapshot(snapshot)
    }

    /// Build an account from snapshot data
    ///
    /// An `id` is taken as a claim that the account is stored; the
    /// repository rejects it at `save` if it is not. An inactive snapshot
    /// must carry an id, since only a committed account can be deleted.
    pub fn from_snapshot(snapshot: AccountSnapshot) -> Result<Self> {
        let mut account = Self::new(&snapshot.name, &snapshot.email)?;
        if snapshot.balance < Decimal::ZERO {
            return Err(Error::validation("balance cannot be negative"));
        }
        if !snapshot.active && snapshot.id.is_none() {
            return Err(Error::validation("an inactive account must have an id"));
        }
        account.id = snapshot.id;
        account.balance = snapshot.balance;
        account.role = snapshot.role;
        account.active = snapshot.active;
        Ok(account)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("balance", &self.balance)
            .field("role", &self.role)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryRepository;
    use crate::domain::credential::test_handler;
    use crate::services::logging::capture_events;

    fn account() -> Account {
        Account::new("Jai Noah", "jainoah@example.com").unwrap()
    }

    #[test]
    fn test_new_account_defaults() {
        let account = account();
        assert_eq!(account.id(), None);
        assert_eq!(account.balance(), Decimal::ZERO);
        assert_eq!(account.role(), Role::User);
        assert!(account.is_active());
        assert!(!account.has_password());
        assert_eq!(account.state(), AccountState::Transient);
    }

    #[test]
    fn test_new_normalizes_fields() {
        let account = Account::new("  Jai Noah ", " JaiNoah@Example.com").unwrap();
        assert_eq!(account.name(), "Jai Noah");
        assert_eq!(account.email(), "jainoah@example.com");
    }

    #[test]
    fn test_new_rejects_missing_fields() {
        assert!(matches!(Account::new("", "a@b.io"), Err(Error::Validation(_))));
        assert!(matches!(Account::new("Jai", ""), Err(Error::Validation(_))));
        assert!(matches!(Account::new("", ""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_new_rejects_malformed_email() {
        let err = Account::new("Jai", "not-an-email").unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("invalid email")));
    }

    #[test]
    fn test_to_dict_fields() {
        let mut account = account();
        account.set_password_with(&test_handler(), "secret123").unwrap();
        let dict = account.to_dict();

        let mut keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["active", "balance", "email", "id", "name", "role"]);
        assert!(!dict.contains_key("password_hash"));
        assert_eq!(dict["name"], json!("Jai Noah"));
        assert_eq!(dict["email"], json!("jainoah@example.com"));
        assert_eq!(dict["role"], json!("user"));
        assert_eq!(dict["active"], json!(true));
        assert_eq!(dict["id"], Value::Null);
    }

    #[test]
    fn test_from_dict_round_trip() {
        let mut account = account();
        account.deposit(Decimal::new(12550, 2)).unwrap();
        account.change_role("admin").unwrap();

        let restored = Account::from_dict(&account.to_dict()).unwrap();
        assert_eq!(restored.name(), account.name());
        assert_eq!(restored.email(), account.email());
        assert_eq!(restored.balance(), account.balance());
        assert_eq!(restored.role(), account.role());
        assert!(!restored.has_password());
    }

    #[test]
    fn test_from_dict_defaults_and_unknown_keys() {
        let map = json!({
            "name": "Lionel Messi",
            "email": "messi@example.com",
            "favourite_colour": "blue"
        });
        let account = Account::from_dict(map.as_object().unwrap()).unwrap();
        assert_eq!(account.balance(), Decimal::ZERO);
        assert_eq!(account.role(), Role::User);
        assert!(account.is_active());
    }

    #[test]
    fn test_from_dict_accepts_numeric_balance() {
        let map = json!({ "name": "A", "email": "a@b.io", "balance": 42 });
        let account = Account::from_dict(map.as_object().unwrap()).unwrap();
        assert_eq!(account.balance(), Decimal::new(42, 0));
    }

    #[test]
    fn test_from_dict_rejects_bad_data() {
        let missing_email = json!({ "name": "A" });
        assert!(matches!(
            Account::from_dict(missing_email.as_object().unwrap()),
            Err(Error::Validation(_))
        ));

        let bad_role = json!({ "name": "A", "email": "a@b.io", "role": "superuser" });
        assert!(matches!(
            Account::from_dict(bad_role.as_object().unwrap()),
            Err(Error::Validation(_))
        ));

        let negative = json!({ "name": "A", "email": "a@b.io", "balance": "-1.00" });
        assert!(matches!(
            Account::from_dict(negative.as_object().unwrap()),
            Err(Error::Validation(_))
        ));

        let bad_email = json!({ "name": "A", "email": "not-an-email" });
        assert!(matches!(
            Account::from_dict(bad_email.as_object().unwrap()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_deposit() {
        let mut account = account();
        account.deposit(Decimal::new(10050, 2)).unwrap();
        account.deposit(Decimal::new(25, 2)).unwrap();
        assert_eq!(account.balance(), Decimal::new(10075, 2));
    }

    #[test]
    fn test_deposit_rejects_non_positive() {
        let mut account = account();
        account.deposit(Decimal::new(100, 0)).unwrap();

        assert!(matches!(account.deposit(Decimal::ZERO), Err(Error::Validation(_))));
        assert!(matches!(
            account.deposit(Decimal::new(-50, 0)),
            Err(Error::Validation(_))
        ));
        assert_eq!(account.balance(), Decimal::new(100, 0));
    }

    #[test]
    fn test_deposit_overflow_leaves_balance() {
        let mut account = account();
        account.deposit(Decimal::MAX).unwrap();
        assert!(matches!(account.deposit(Decimal::ONE), Err(Error::Validation(_))));
        assert_eq!(account.balance(), Decimal::MAX);
    }

    #[test]
    fn test_withdraw() {
        let mut account = account();
        account.deposit(Decimal::new(100, 0)).unwrap();
        account.withdraw(Decimal::new(3050, 2)).unwrap();
        assert_eq!(account.balance(), Decimal::new(6950, 2));

        account.withdraw(Decimal::new(6950, 2)).unwrap();
        assert_eq!(account.balance(), Decimal::ZERO);
    }

    #[test]
    fn test_withdraw_insufficient_funds() {
        let mut account = account();
        account.deposit(Decimal::new(50, 0)).unwrap();

        let err = account.withdraw(Decimal::new(5001, 2)).unwrap_err();
        match err {
            Error::InsufficientFunds { requested, available } => {
                assert_eq!(requested, Decimal::new(5001, 2));
                assert_eq!(available, Decimal::new(50, 0));
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
        assert_eq!(account.balance(), Decimal::new(50, 0));
    }

    #[test]
    fn test_withdraw_rejects_non_positive() {
        let mut account = account();
        account.deposit(Decimal::new(50, 0)).unwrap();
        assert!(matches!(account.withdraw(Decimal::ZERO), Err(Error::Validation(_))));
        assert!(matches!(
            account.withdraw(Decimal::new(-5, 0)),
            Err(Error::Validation(_))
        ));
        assert_eq!(account.balance(), Decimal::new(50, 0));
    }

    #[test]
    fn test_change_role() {
        let mut account = account();
        account.change_role("admin").unwrap();
        assert_eq!(account.role(), Role::Admin);

        assert!(matches!(account.change_role("superuser"), Err(Error::Validation(_))));
        assert_eq!(account.role(), Role::Admin);
    }

    #[test]
    fn test_password() {
        let mut account = account();
        assert!(matches!(account.check_password("anything"), Err(Error::Validation(_))));

        account.set_password_with(&test_handler(), "secret123").unwrap();
        assert!(account.check_password("secret123").unwrap());
        assert!(!account.check_password("wrong").unwrap());
        assert_ne!(account.password_hash(), Some("secret123"));
    }

    #[test]
    fn test_password_overwrite_and_empty() {
        let mut account = account();
        let handler = test_handler();
        account.set_password_with(&handler, "first").unwrap();
        let first_hash = account.password_hash().unwrap().to_string();

        assert!(matches!(account.set_password_with(&handler, ""), Err(Error::Validation(_))));
        assert_eq!(account.password_hash(), Some(first_hash.as_str()));

        account.set_password_with(&handler, "second").unwrap();
        assert!(!account.check_password("first").unwrap());
        assert!(account.check_password("second").unwrap());
    }

    #[test]
    fn test_debug_redacts_hash() {
        let mut account = account();
        account.set_password_with(&test_handler(), "secret123").unwrap();
        let hash = account.password_hash().unwrap().to_string();
        let debug = format!("{:?}", account);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&hash));
    }

    #[test]
    fn test_save_assigns_id() {
        let repo = MemoryRepository::new();
        let mut account = account();
        let id = account.save(&repo).unwrap();
        assert_eq!(account.id(), Some(id));
        assert_eq!(account.state(), AccountState::Active);
    }

    #[test]
    fn test_save_conflict_stays_transient() {
        let repo = MemoryRepository::new();
        account().save(&repo).unwrap();

        let mut duplicate = Account::new("Lionel Messi", "jainoah@example.com").unwrap();
        let err = duplicate.save(&repo).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(duplicate.id(), None);
        assert_eq!(duplicate.state(), AccountState::Transient);
    }

    #[test]
    fn test_delete_lifecycle() {
        let repo = MemoryRepository::new();
        let mut transient = account();
        assert!(matches!(transient.delete(&repo), Err(Error::Validation(_))));

        let mut account = account();
        account.save(&repo).unwrap();
        account.delete(&repo).unwrap();
        assert_eq!(account.state(), AccountState::Deleted);

        assert!(matches!(account.delete(&repo), Err(Error::Validation(_))));
        assert!(matches!(account.deposit(Decimal::ONE), Err(Error::Validation(_))));
        assert!(matches!(account.change_role("admin"), Err(Error::Validation(_))));
        assert!(matches!(account.save(&repo), Err(Error::Validation(_))));
    }

    #[test]
    fn test_from_dict_with_unknown_id_cannot_be_saved() {
        let repo = MemoryRepository::new();
        let id = Uuid::new_v4();
        let map = json!({ "id": id, "name": "Jai Noah", "email": "jainoah@example.com" });
        let mut account = Account::from_dict(map.as_object().unwrap()).unwrap();
        assert_eq!(account.id(), Some(id));

        let err = account.save(&repo).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn test_from_dict_inactive_requires_id() {
        let map = json!({ "name": "Jai Noah", "email": "jainoah@example.com", "active": false });
        assert!(matches!(
            Account::from_dict(map.as_object().unwrap()),
            Err(Error::Validation(_))
        ));

        let map = json!({
            "id": Uuid::new_v4(),
            "name": "Jai Noah",
            "email": "jainoah@example.com",
            "active": false
        });
        let account = Account::from_dict(map.as_object().unwrap()).unwrap();
        assert_eq!(account.state(), AccountState::Deleted);
    }

    #[test]
    fn test_rejected_construction_is_logged() {
        let output = capture_events(|| {
            assert!(Account::new("Jai Noah", "hidden-address").is_err());
        });
        assert!(output.contains("account construction rejected"));
        assert!(output.contains("validation"));
        assert!(!output.contains("hidden-address"));
    }

    #[test]
    fn test_rejected_deposit_is_logged() {
        let mut account = account();
        let output = capture_events(|| {
            assert!(account.deposit(Decimal::new(-4217, 2)).is_err());
        });
        assert!(output.contains("deposit rejected"));
        assert!(output.contains("validation"));
        assert!(!output.contains("42.17"));
        assert_eq!(account.balance(), Decimal::ZERO);
    }

    #[test]
    fn test_rejected_withdrawal_is_logged() {
        let mut account = account();
        let output = capture_events(|| {
            assert!(account.withdraw(Decimal::new(5, 0)).is_err());
        });
        assert!(output.contains("withdrawal rejected"));
        assert!(output.contains("insufficient_funds"));
    }
}
