//! End-user credential verification.
//!
//! Each attempt opens its own connection, binds once and throws the connection away. The
//! privileged session is never involved, so a failed or slow verification cannot affect
//! operational calls.

use crate::backend::DirectoryConnector;
use crate::config::DirectoryConfig;
use dirgate_core::Credential;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

/// Checks identifier/secret pairs against the directory.
pub struct CredentialVerifier {
    config: Arc<DirectoryConfig>,
    connector: Arc<dyn DirectoryConnector>,
}

impl CredentialVerifier {
    /// Creates a verifier that opens connections through `connector`.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self { config, connector }
    }

    /// Returns `true` if the directory accepts the credentials.
    ///
    /// Every failure (unknown account, wrong secret, unreachable directory, timeout) yields
    /// `false`. Blank identifiers or secrets are refused without contacting the directory.
    pub async fn verify(&self, identifier: &str, secret: &str) -> bool {
        self.verify_credential(&Credential::new(identifier, secret))
            .await
    }

    /// [`verify`](CredentialVerifier::verify) for an owned credential pair.
    pub async fn verify_credential(&self, credential: &Credential) -> bool {
        if credential.is_blank() {
            debug!("blank credentials refused");
            return false;
        }

        let principal = self.principal(credential.identifier());
        let verified = match timeout(self.config.connection_timeout(), self.connector.connect())
            .await
        {
            Ok(Ok(mut connection)) => {
                let outcome = timeout(
                    self.config.operation_timeout(),
                    connection.simple_bind(&principal, credential.secret()),
                )
                .await;
                // Best effort; the connection is dropped either way.
                let _ = timeout(self.config.operation_timeout(), connection.unbind()).await;
                matches!(outcome, Ok(Ok(())))
            }
            Ok(Err(err)) => {
                debug!(error = %err, "verification connect failed");
                false
            }
            Err(_) => {
                debug!("verification connect timed out");
                false
            }
        };
        debug!(principal = %principal, verified, "credential verification");
        verified
    }

    /// Appends the realm suffix to bare logon names.
    ///
    /// Names already in UPN (`user@realm`), down-level (`DOMAIN\user`) or DN form are left
    /// alone.
    fn principal<'a>(&self, identifier: &'a str) -> Cow<'a, str> {
        let qualified = identifier.contains(&['@', '\\', '='][..]);
        match self.config.principal_suffix() {
            Some(suffix) if !qualified => Cow::Owned(format!("{identifier}{suffix}")),
            _ => Cow::Borrowed(identifier),
        }
    }
}
