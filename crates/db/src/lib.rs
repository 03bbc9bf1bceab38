pub mod connection;
pub mod credential_store;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_settings, DbPool};
pub use credential_store::{CredentialStore, CredentialStoreError, InstallGrant};
