//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions.

mod account;
pub mod logging;
pub mod migration;

pub use account::AccountService;
pub use migration::{MigrationResult, MigrationService};
