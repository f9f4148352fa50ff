//! Account Core - the account entity and the rules it enforces
//!
//! This crate follows hexagonal architecture:
//!
//! - **domain**: The Account entity, validators, credential handling, errors
//! - **ports**: The `AccountRepository` trait the entity persists through
//! - **services**: Use-case orchestration, migrations, logging setup
//! - **adapters**: Concrete repositories (DuckDB, in-memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use adapters::duckdb::DuckDbRepository;
use adapters::memory::MemoryRepository;
use config::Config;
use services::AccountService;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{Account, AccountSnapshot, AccountState, Argon2Params, CredentialHandler, Role};
pub use ports::AccountRepository;

/// Main context for account operations
///
/// Holds the configuration, the repository chosen by it and the service
/// built on top.
pub struct AccountContext {
    pub config: Config,
    pub repository: Arc<dyn AccountRepository>,
    pub account_service: AccountService,
}

impl AccountContext {
    /// Create a context rooted at `data_dir`
    ///
    /// Opens `<data_dir>/<databaseFile>` and runs migrations, unless the
    /// config selects in-memory storage.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;

        let repository: Arc<dyn AccountRepository> = if config.in_memory {
            info!("using in-memory account storage");
            Arc::new(MemoryRepository::new())
        } else {
            let db_path = data_dir.join(&config.database_file);
            let repository = DuckDbRepository::new(&db_path)
                .with_context(|| format!("Failed to open database {}", db_path.display()))?;
            repository.ensure_schema().context("Failed to initialize schema")?;
            info!(path = %db_path.display(), "opened account database");
            Arc::new(repository)
        };

        Ok(Self::with_repository(config, repository))
    }

    /// Context over a fresh in-memory store with default config
    pub fn in_memory() -> Self {
        let config = Config {
            in_memory: true,
            ..Config::default()
        };
        Self::with_repository(config, Arc::new(MemoryRepository::new()))
    }

    pub fn with_repository(config: Config, repository: Arc<dyn AccountRepository>) -> Self {
        let credentials = CredentialHandler::new(config.credentials.clone());
        let account_service = AccountService::new(Arc::clone(&repository), credentials);
        Self {
            config,
            repository,
            account_service,
        }
    }
}
