//! Directory gateway for Active-Directory-style LDAP servers.
//!
//! Binds with a privileged service identity for account and computer lifecycle operations,
//! verifies end-user credentials over separate short-lived connections, and encodes passwords
//! the way the directory expects them. Callers never see LDAP types; every failure is reported
//! through [`dirgate_core::Error`].

#![deny(missing_docs)]

mod backend;
mod computers;
mod config;
mod dn;
mod entry;
mod filter;
mod gateway;
mod ldap;
mod operations;
mod password;
mod session;
mod users;
mod verifier;

pub use backend::{DirectoryConnection, DirectoryConnector};
pub use computers::{Computer, OrganizationalUnit};
pub use config::{DirectoryConfig, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_OPERATION_TIMEOUT_SECS};
pub use dn::{DistinguishedName, DistinguishedNameError, RelativeDistinguishedName};
pub use entry::{AttributeChange, AttributeSet, AttributeValue, DirectoryEntry};
pub use filter::{
    all_users_filter, computer_filter, organizational_unit_filter, user_filter, UserLookup,
};
pub use gateway::DirectoryGateway;
pub use ldap::LdapConnector;
pub use operations::DirectoryOperations;
pub use password::encode_password;
pub use session::{DirectorySession, SessionState};
pub use users::{AccountControl, UserAccount};
pub use verifier::CredentialVerifier;

/// Convenient result alias that reuses the core error type.
pub type Result<T> = dirgate_core::Result<T>;
