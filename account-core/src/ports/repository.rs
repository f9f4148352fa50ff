//! Repository port - durable account storage

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::Account;

/// Account storage abstraction
///
/// Implementations own uniqueness: the email check and the write in `commit`
/// must happen atomically, so two concurrent commits of the same email
/// cannot both succeed.
pub trait AccountRepository: Send + Sync {
    /// Store an account and return its id
    ///
    /// An account without an id is inserted under a fresh id. An account
    /// with an id replaces the stored row, or fails with `NotFound` if
    /// there is none. Fails with `Conflict` when another stored account
    /// already holds the same email.
    fn commit(&self, account: &Account) -> Result<Uuid>;

    /// Look up an account by its normalized email
    fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Look up an account by id
    fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// Delete a stored account; `NotFound` if it is not stored
    fn remove(&self, account: &Account) -> Result<()>;

    /// All stored accounts, ordered by email
    fn list(&self) -> Result<Vec<Account>>;

    /// Remove every account (test and setup utility)
    fn clear_all(&self) -> Result<()>;
}
