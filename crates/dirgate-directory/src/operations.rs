//! Typed account and computer operations over the privileged session.
//!
//! The operations themselves are split by object kind into [`crate::users`] and
//! [`crate::computers`]. Every mutation resolves its target first, so a missing account fails
//! with [`dirgate_core::Error::NotFound`] before anything is written.

use crate::config::DirectoryConfig;
use crate::session::DirectorySession;
use dirgate_core::Error;
use std::sync::Arc;

/// Account/computer lifecycle operations.
#[derive(Clone)]
pub struct DirectoryOperations {
    pub(crate) session: Arc<DirectorySession>,
}

impl DirectoryOperations {
    /// Wraps a shared session.
    #[must_use]
    pub fn new(session: Arc<DirectorySession>) -> Self {
        Self { session }
    }

    /// The underlying privileged session.
    #[must_use]
    pub fn session(&self) -> &DirectorySession {
        &self.session
    }

    pub(crate) fn config(&self) -> &DirectoryConfig {
        self.session.config()
    }
}

/// Rejects blank names before they reach a filter or a DN.
pub(crate) fn require_name<'a>(kind: &str, name: &'a str) -> crate::Result<&'a str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidRequest(format!("{kind} name must not be empty")));
    }
    Ok(trimmed)
}

/// Turns a successful pre-check lookup into `AlreadyExists` and a miss into `Ok`.
pub(crate) fn ensure_absent<T>(found: crate::Result<T>, description: String) -> crate::Result<()> {
    match found {
        Ok(_) => Err(Error::AlreadyExists(description)),
        Err(Error::NotFound(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

/// Operations over a mocked connection bound with the service identity.
#[cfg(test)]
pub(crate) fn operations_over(
    mut connection: crate::backend::MockDirectoryConnection,
) -> DirectoryOperations {
    use crate::backend::MockDirectoryConnector;
    use crate::dn::DistinguishedName;
    use dirgate_core::ServiceIdentity;

    connection.expect_simple_bind().returning(|_, _| Ok(()));
    connection.expect_is_closed().returning(|| false);
    let mut connector = MockDirectoryConnector::new();
    connector
        .expect_connect()
        .times(1)
        .return_once(move || Ok(Box::new(connection)));

    let config = DirectoryConfig::new(
        "ldaps://dc01.corp.example.com",
        ServiceIdentity::new("svc-gateway", "svc-pass"),
        DistinguishedName::parse("DC=corp,DC=example,DC=com").unwrap(),
    )
    .unwrap();
    DirectoryOperations::new(Arc::new(DirectorySession::new(
        Arc::new(config),
        Arc::new(connector),
    )))
}
