//! DuckDB repository implementation

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Role};
use crate::ports::AccountRepository;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const SELECT_ACCOUNT: &str =
    "SELECT account_id, name, email, balance, role, password_hash FROM sys_accounts";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Constraint violations become `Conflict`; anything else is a database fault
impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("constraint") && (lower.contains("unique") || lower.contains("duplicate key")) {
            Error::Conflict(msg)
        } else {
            Error::Database(msg)
        }
    }
}

/// Raw column values as read from sys_accounts
struct AccountRow {
    id: String,
    name: String,
    email: String,
    balance: String,
    role: String,
    password_hash: Option<String>,
}

impl AccountRow {
    fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            balance: row.get(3)?,
            role: row.get(4)?,
            password_hash: row.get(5)?,
        })
    }

    fn into_account(self) -> Result<Account> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| Error::database(format!("corrupt account id {}: {}", self.id, e)))?;
        let balance = Decimal::from_str(&self.balance)
            .map_err(|e| Error::database(format!("corrupt balance for account {}: {}", id, e)))?;
        let role = Role::from_str(&self.role)
            .map_err(|_| Error::database(format!("corrupt role for account {}", id)))?;

        Account::from_persistence(id, &self.name, &self.email, balance, role, self.password_hash)
    }
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
}

impl DuckDbRepository {
    /// Open (or create) a database file
    ///
    /// Retries with exponential backoff on file locking errors, which occur
    /// when another process briefly holds the database.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            delay_ms = (delay.as_millis() as u64),
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            error = %err_msg,
                            "database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// Non-durable database, mostly for tests
    pub fn in_memory() -> anyhow::Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
        })
    }

    fn try_open_connection(db_path: &Path) -> anyhow::Result<Connection> {
        // Extension autoloading off: nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Run pending schema migrations
    pub fn run_migrations(&self) -> anyhow::Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists
    pub fn ensure_schema(&self) -> anyhow::Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    fn query_accounts(conn: &Connection, filter: &str, arg: Option<&str>) -> Result<Vec<Account>> {
        let sql = format!("{} {}", SELECT_ACCOUNT, filter);
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<AccountRow> = match arg {
            Some(arg) => stmt
                .query_map(params![arg], AccountRow::from_row)?
                .collect::<duckdb::Result<_>>()?,
            None => stmt
                .query_map([], AccountRow::from_row)?
                .collect::<duckdb::Result<_>>()?,
        };

        rows.into_iter().map(AccountRow::into_account).collect()
    }

    fn email_owner(conn: &Connection, email: &str) -> Result<Option<String>> {
        let mut stmt = conn.prepare("SELECT account_id FROM sys_accounts WHERE email = ?")?;
        let mut ids = stmt.query_map(params![email], |row| row.get::<_, String>(0))?;
        Ok(ids.next().transpose()?)
    }

    fn stored_email(conn: &Connection, id: &str) -> Result<Option<String>> {
        let mut stmt = conn.prepare("SELECT email FROM sys_accounts WHERE account_id = ?")?;
        let mut emails = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
        Ok(emails.next().transpose()?)
    }
}

impl AccountRepository for DuckDbRepository {
    fn commit(&self, account: &Account) -> Result<Uuid> {
        // The connection lock serializes check-and-write; the UNIQUE
        // constraint backs it up for anything writing outside this handle.
        let mut conn = self.lock()?;
        let id = account.id().unwrap_or_else(Uuid::new_v4);
        let id_str = id.to_string();

        if let Some(owner) = Self::email_owner(&conn, account.email())? {
            if owner != id_str {
                return Err(Error::conflict(format!(
                    "email already registered: {}",
                    account.email()
                )));
            }
        }

        let balance = account.balance().to_string();
        let role = account.role().as_str();

        if account.id().is_none() {
            conn.execute(
                "INSERT INTO sys_accounts (account_id, name, email, password_hash, balance, role)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    id_str,
                    account.name(),
                    account.email(),
                    account.password_hash(),
                    balance,
                    role,
                ],
            )?;
            debug!(account_id = %id, "account inserted");
            return Ok(id);
        }

        // Both updates land together or not at all
        let tx = conn.transaction()?;
        let stored_email = Self::stored_email(&tx, &id_str)?
            .ok_or_else(|| Error::not_found(format!("account {}", id)))?;

        // Only touch the indexed email column when it actually changes
        if stored_email != account.email() {
            tx.execute(
                "UPDATE sys_accounts SET email = ? WHERE account_id = ?",
                params![account.email(), id_str],
            )?;
        }
        tx.execute(
            "UPDATE sys_accounts
             SET name = ?, password_hash = ?, balance = ?, role = ?, updated_at = CURRENT_TIMESTAMP
             WHERE account_id = ?",
            params![account.name(), account.password_hash(), balance, role, id_str],
        )?;
        tx.commit()?;
        debug!(account_id = %id, "account updated");
        Ok(id)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let email = email.trim().to_lowercase();
        let conn = self.lock()?;
        Ok(Self::query_accounts(&conn, "WHERE email = ?", Some(&email))?
            .into_iter()
            .next())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let conn = self.lock()?;
        Ok(Self::query_accounts(&conn, "WHERE account_id = ?", Some(&id.to_string()))?
            .into_iter()
            .next())
    }

    fn remove(&self, account: &Account) -> Result<()> {
        let id = account
            .id()
            .ok_or_else(|| Error::not_found("account has no id"))?;
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM sys_accounts WHERE account_id = ?",
            params![id.to_string()],
        )?;
        if deleted == 0 {
            return Err(Error::not_found(format!("account {}", id)));
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<Account>> {
        let conn = self.lock()?;
        Self::query_accounts(&conn, "ORDER BY email", None)
    }

    fn clear_all(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM sys_accounts", [])?;
        Ok(())
    }
}
