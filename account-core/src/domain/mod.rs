//! Core domain entities
//!
//! The account entity and the rules it enforces. Persistence is reached only
//! through the `AccountRepository` port passed into lifecycle methods.

mod account;
pub mod credential;
mod role;
pub mod result;
pub mod validation;

pub use account::{Account, AccountSnapshot, AccountState};
pub use credential::{Argon2Params, CredentialHandler};
pub use role::Role;
