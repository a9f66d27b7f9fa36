//! Pluggable directory backend.
//!
//! The session and the verifier only talk to the directory through these traits. The
//! production implementation lives in [`crate::ldap`]; tests supply in-memory fakes or mocks.
//! Implementations must translate protocol failures into the [`dirgate_core::Error`] taxonomy
//! before returning.

use crate::entry::{AttributeChange, AttributeSet, DirectoryEntry};
use crate::Result;
use async_trait::async_trait;

/// One open connection to the directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Simple bind with a name and password.
    async fn simple_bind(&mut self, name: &str, password: &str) -> Result<()>;

    /// Subtree search. An empty result is not an error.
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<DirectoryEntry>>;

    /// Applies a replace-style attribute change.
    async fn modify(&mut self, change: &AttributeChange) -> Result<()>;

    /// Creates an entry.
    async fn add(&mut self, dn: &str, attributes: &AttributeSet) -> Result<()>;

    /// Deletes an entry.
    async fn delete(&mut self, dn: &str) -> Result<()>;

    /// Modify-DN: gives the entry `new_rdn` under `new_superior`, removing the old RDN value.
    async fn rename(&mut self, dn: &str, new_rdn: &str, new_superior: &str) -> Result<()>;

    /// Closes the connection.
    async fn unbind(&mut self) -> Result<()>;

    /// True once the transport is gone, e.g. after the server dropped an idle connection.
    fn is_closed(&mut self) -> bool;
}

/// Opens new connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Opens an unbound connection.
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>>;
}
