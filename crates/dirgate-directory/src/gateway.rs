//! Composition root.

use std::sync::Arc;

use crate::backend::DirectoryConnector;
use crate::computers::{Computer, OrganizationalUnit};
use crate::config::DirectoryConfig;
use crate::dn::DistinguishedName;
use crate::entry::DirectoryEntry;
use crate::filter::UserLookup;
use crate::ldap::LdapConnector;
use crate::operations::DirectoryOperations;
use crate::session::DirectorySession;
use crate::users::UserAccount;
use crate::verifier::CredentialVerifier;
use crate::Result;
use dirgate_core::DirectorySettings;

/// Everything a routing layer needs: credential verification plus account and computer
/// operations over one shared privileged session.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct DirectoryGateway {
    verifier: CredentialVerifier,
    operations: DirectoryOperations,
}

impl DirectoryGateway {
    /// Builds a gateway that talks LDAP to the configured endpoint.
    ///
    /// Nothing is opened until the first call.
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        let config = Arc::new(config);
        let connector = Arc::new(LdapConnector::new(Arc::clone(&config)));
        Self::assemble(config, connector)
    }

    /// Builds a gateway over a caller-supplied connector.
    #[must_use]
    pub fn with_connector(config: DirectoryConfig, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self::assemble(Arc::new(config), connector)
    }

    /// Builds an LDAP gateway from environment-style settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings do not form a valid configuration.
    pub fn from_settings(settings: DirectorySettings) -> Result<Self> {
        Ok(Self::new(DirectoryConfig::try_from(settings)?))
    }

    fn assemble(config: Arc<DirectoryConfig>, connector: Arc<dyn DirectoryConnector>) -> Self {
        let session = Arc::new(DirectorySession::new(
            Arc::clone(&config),
            Arc::clone(&connector),
        ));
        Self {
            verifier: CredentialVerifier::new(config, connector),
            operations: DirectoryOperations::new(session),
        }
    }

    /// The privileged session.
    #[must_use]
    pub fn session(&self) -> &DirectorySession {
        self.operations.session()
    }

    /// The typed operations.
    #[must_use]
    pub const fn operations(&self) -> &DirectoryOperations {
        &self.operations
    }

    /// See [`CredentialVerifier::verify`].
    pub async fn verify(&self, identifier: &str, secret: &str) -> bool {
        self.verifier.verify(identifier, secret).await
    }

    /// See [`DirectoryOperations::find_user`].
    ///
    /// # Errors
    ///
    /// Returns [`dirgate_core::Error::NotFound`] if no user matches.
    pub async fn find_user(&self, name: &str, lookup: UserLookup) -> Result<DirectoryEntry> {
        self.operations.find_user(name, lookup).await
    }

    /// See [`DirectoryOperations::user_profile`].
    ///
    /// # Errors
    ///
    /// Returns [`dirgate_core::Error::NotFound`] if no user matches.
    pub async fn user_profile(&self, username: &str) -> Result<UserAccount> {
        self.operations.user_profile(username).await
    }

    /// See [`DirectoryOperations::list_users`].
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn list_users(&self) -> Result<Vec<UserAccount>> {
        self.operations.list_users().await
    }

    /// See [`DirectoryOperations::create_user`].
    ///
    /// # Errors
    ///
    /// Returns [`dirgate_core::Error::AlreadyExists`] if the account exists.
    pub async fn create_user(
        &self,
        username: &str,
        first_name: &str,
        last_name: &str,
        initial_password: Option<&str>,
    ) -> Result<DistinguishedName> {
        self.operations
            .create_user(username, first_name, last_name, initial_password)
            .await
    }

    /// See [`DirectoryOperations::unlock_user`].
    ///
    /// # Errors
    ///
    /// Returns [`dirgate_core::Error::NotFound`] if no user matches.
    pub async fn unlock_user(&self, username: &str) -> Result<()> {
        self.operations.unlock_user(username).await
    }

    /// See [`DirectoryOperations::reset_password`].
    ///
    /// # Errors
    ///
    /// Returns [`dirgate_core::Error::NotFound`] if no user matches and
    /// [`dirgate_core::Error::DirectoryRejected`] on a policy violation.
    pub async fn reset_password(&self, username: &str, new_password: &str) -> Result<()> {
        self.operations.reset_password(username, new_password).await
    }

    /// See [`DirectoryOperations::find_computer`].
    ///
    /// # Errors
    ///
    /// Returns [`dirgate_core::Error::NotFound`] if no computer matches.
    pub async fn find_computer(&self, name: &str) -> Result<DirectoryEntry> {
        self.operations.find_computer(name).await
    }

    /// See [`DirectoryOperations::computer_profile`].
    ///
    /// # Errors
    ///
    /// Returns [`dirgate_core::Error::NotFound`] if no computer matches.
    pub async fn computer_profile(&self, name: &str) -> Result<Computer> {
        self.operations.computer_profile(name).await
    }

    /// See [`DirectoryOperations::create_computer`].
    ///
    /// # Errors
    ///
    /// Returns [`dirgate_core::Error::AlreadyExists`] if the computer exists.
    pub async fn create_computer(
        &self,
        name: &str,
        organizational_unit: &DistinguishedName,
    ) -> Result<DistinguishedName> {
        self.operations
            .create_computer(name, organizational_unit)
            .await
    }

    /// See [`DirectoryOperations::delete_computer`].
    ///
    /// # Errors
    ///
    /// Returns [`dirgate_core::Error::NotFound`] if no computer matches.
    pub async fn delete_computer(&self, name: &str) -> Result<()> {
        self.operations.delete_computer(name).await
    }

    /// See [`DirectoryOperations::move_computer`].
    ///
    /// # Errors
    ///
    /// Returns [`dirgate_core::Error::NotFound`] or [`dirgate_core::Error::TargetConflict`].
    pub async fn move_computer(
        &self,
        dn: &DistinguishedName,
        target: &DistinguishedName,
    ) -> Result<()> {
        self.operations.move_computer(dn, target).await
    }

    /// See [`DirectoryOperations::list_organizational_units`].
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn list_organizational_units(
        &self,
        containing: Option<&str>,
    ) -> Result<Vec<OrganizationalUnit>> {
        self.operations.list_organizational_units(containing).await
    }
}
