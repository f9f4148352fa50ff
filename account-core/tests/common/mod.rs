//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tempfile::TempDir;

use account_core::adapters::duckdb::DuckDbRepository;
use account_core::{Account, AccountRepository, Argon2Params, CredentialHandler};

/// Account records loaded from `tests/fixtures/account_data.json`
///
/// Each call reads the file again and hands back an owned dataset, so no
/// state leaks between tests.
pub fn load_account_fixtures() -> Vec<Map<String, Value>> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/account_data.json");
    let content = std::fs::read_to_string(&path).expect("Failed to read account fixtures");
    serde_json::from_str(&content).expect("Failed to parse account fixtures")
}

/// Fixture records turned into transient accounts
pub fn fixture_accounts() -> Vec<Account> {
    load_account_fixtures()
        .iter()
        .map(|record| Account::from_dict(record).expect("Invalid fixture record"))
        .collect()
}

/// Cheap Argon2 parameters so the suite stays fast
pub fn fast_credentials() -> CredentialHandler {
    CredentialHandler::new(Argon2Params {
        time_cost: 1,
        memory_cost: 1024,
        parallelism: 1,
        hash_len: 32,
    })
}

/// File-backed repository with schema initialized
pub fn create_test_repo(temp_dir: &TempDir) -> Arc<DuckDbRepository> {
    let db_path = temp_dir.path().join("test.duckdb");
    let repo = DuckDbRepository::new(&db_path).expect("Failed to create repository");
    repo.ensure_schema().expect("Failed to initialize schema");
    Arc::new(repo)
}

/// Commit every fixture account, returning them with ids assigned
pub fn seed<R: AccountRepository + ?Sized>(repo: &R) -> Vec<Account> {
    fixture_accounts()
        .into_iter()
        .map(|mut account| {
            account.save(repo).expect("Failed to seed account");
            account
        })
        .collect()
}
