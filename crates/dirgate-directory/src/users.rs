//! User accounts: typed projection and lifecycle operations.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::dn::DistinguishedName;
use crate::entry::{AttributeSet, DirectoryEntry};
use crate::filter::{all_users_filter, user_filter, UserLookup};
use crate::operations::{ensure_absent, require_name, DirectoryOperations};
use crate::password::encode_password;
use crate::Result;
use dirgate_core::Error;

/// Seconds between the FILETIME epoch (1601-01-01) and the Unix epoch.
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;
const FILETIME_TICKS_PER_SEC: i64 = 10_000_000;

/// `userAccountControl` bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct AccountControl(u32);

impl AccountControl {
    /// The account is disabled.
    pub const ACCOUNT_DISABLE: Self = Self(0x0002);
    /// The account is locked out.
    pub const LOCKOUT: Self = Self(0x0010);
    /// No password is required.
    pub const PASSWORD_NOT_REQUIRED: Self = Self(0x0020);
    /// Regular user account.
    pub const NORMAL_ACCOUNT: Self = Self(0x0200);
    /// Computer account for a domain member.
    pub const WORKSTATION_TRUST_ACCOUNT: Self = Self(0x1000);
    /// The password never expires.
    pub const DONT_EXPIRE_PASSWORD: Self = Self(0x1_0000);

    /// Flags given to newly created users (`544`).
    pub const NEW_USER: Self = Self(Self::NORMAL_ACCOUNT.0 | Self::PASSWORD_NOT_REQUIRED.0);
    /// Flags given to newly created computers (`4096`).
    pub const NEW_COMPUTER: Self = Self::WORKSTATION_TRUST_ACCOUNT;

    /// Wraps raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Decimal form stored in the directory.
    #[must_use]
    pub fn to_attribute(self) -> String {
        self.0.to_string()
    }
}

/// Typed view of a user entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAccount {
    /// Distinguished name of the entry.
    pub dn: DistinguishedName,
    /// Logon name (`sAMAccountName`).
    pub account_name: String,
    /// Common name.
    pub common_name: Option<String>,
    /// Given name.
    pub given_name: Option<String>,
    /// Surname.
    pub surname: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Primary email address.
    pub mail: Option<String>,
    /// User principal name.
    pub user_principal_name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Account control flags.
    pub control: AccountControl,
    /// When the account was locked out, if it currently is.
    pub locked_out_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Groups the account is a direct member of.
    pub groups: Vec<DistinguishedName>,
}

impl UserAccount {
    /// Projects a directory entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry has no `sAMAccountName` or carries an unparseable DN.
    pub fn from_entry(entry: &DirectoryEntry) -> Result<Self> {
        let dn = DistinguishedName::parse(&entry.dn)?;
        let account_name = entry
            .first("sAMAccountName")
            .ok_or_else(|| {
                Error::InternalError(format!("entry `{}` has no sAMAccountName", entry.dn))
            })?
            .to_string();
        let owned = |attribute: &str| entry.first(attribute).map(str::to_string);

        let control = entry
            .first("userAccountControl")
            .and_then(|value| value.parse().ok())
            .map(AccountControl::from_bits)
            .unwrap_or_default();

        let groups = entry
            .values("memberOf")
            .unwrap_or_default()
            .iter()
            .filter_map(|group| DistinguishedName::parse(group).ok())
            .collect();

        Ok(Self {
            dn,
            account_name,
            common_name: owned("cn"),
            given_name: owned("givenName"),
            surname: owned("sn"),
            display_name: owned("displayName"),
            mail: owned("mail"),
            user_principal_name: owned("userPrincipalName"),
            description: owned("description"),
            control,
            locked_out_at: entry.first("lockoutTime").and_then(parse_filetime),
            created_at: entry.first("whenCreated").and_then(parse_generalized_time),
            groups,
        })
    }

    /// True if the account is disabled.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.control.contains(AccountControl::ACCOUNT_DISABLE)
    }

    /// True if the account is locked out.
    #[must_use]
    pub fn is_locked_out(&self) -> bool {
        self.locked_out_at.is_some() || self.control.contains(AccountControl::LOCKOUT)
    }
}

/// Decodes a Windows FILETIME (100ns ticks since 1601). Zero means "never".
fn parse_filetime(value: &str) -> Option<DateTime<Utc>> {
    let ticks: i64 = value.trim().parse().ok()?;
    if ticks <= 0 {
        return None;
    }
    let secs = ticks / FILETIME_TICKS_PER_SEC - FILETIME_UNIX_OFFSET_SECS;
    let nanos = u32::try_from((ticks % FILETIME_TICKS_PER_SEC) * 100).ok()?;
    DateTime::from_timestamp(secs, nanos)
}

/// Decodes generalized time such as `20240115083000.0Z`.
fn parse_generalized_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().strip_suffix('Z')?;
    let whole = value.split('.').next()?;
    NaiveDateTime::parse_from_str(whole, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

impl DirectoryOperations {
    /// Looks up a user entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no user matches.
    pub async fn find_user(&self, name: &str, lookup: UserLookup) -> Result<DirectoryEntry> {
        let name = require_name("user", name)?;
        self.session
            .search_unique(&user_filter(name, lookup), None)
            .await
            .map_err(|err| match err {
                Error::NotFound(_) => {
                    Error::NotFound(format!("user `{name}` not found by {}", lookup.attribute()))
                }
                other => other,
            })
    }

    /// Typed profile of the user with the given logon name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no user matches.
    pub async fn user_profile(&self, username: &str) -> Result<UserAccount> {
        let entry = self.find_user(username, UserLookup::AccountName).await?;
        UserAccount::from_entry(&entry)
    }

    /// Every user-class entry under the base DN. Entries that cannot be projected are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn list_users(&self) -> Result<Vec<UserAccount>> {
        let entries = self.session.search(all_users_filter(), None).await?;
        Ok(entries
            .iter()
            .filter_map(|entry| match UserAccount::from_entry(entry) {
                Ok(account) => Some(account),
                Err(err) => {
                    warn!(dn = %entry.dn, error = %err, "skipping unreadable user entry");
                    None
                }
            })
            .collect())
    }

    /// Creates a user in the configured users container and returns its DN.
    ///
    /// Without `initial_password` the configured placeholder is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if the logon name is taken or the DN collides, and
    /// [`Error::DirectoryRejected`] if the server refuses the password.
    pub async fn create_user(
        &self,
        username: &str,
        first_name: &str,
        last_name: &str,
        initial_password: Option<&str>,
    ) -> Result<DistinguishedName> {
        let username = require_name("user", username)?;
        ensure_absent(
            self.find_user(username, UserLookup::AccountName).await,
            format!("user `{username}` already exists"),
        )?;

        let config = self.config();
        let password = initial_password.unwrap_or_else(|| config.default_initial_password());
        let dn = DistinguishedName::child(config.users_container(), "CN", username);
        let attributes = AttributeSet::new()
            .with("cn", username)
            .with("givenName", first_name)
            .with("sn", last_name)
            .with("objectClass", "user")
            .with("uid", username)
            .with("sAMAccountName", username)
            .with("unicodePwd", encode_password(password))
            .with("userAccountControl", AccountControl::NEW_USER.to_attribute());

        self.session.add(&dn, &attributes).await?;
        info!(username, dn = dn.as_str(), "user created");
        Ok(dn)
    }

    /// Clears the lockout of a user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the user does not exist; nothing is modified then.
    pub async fn unlock_user(&self, username: &str) -> Result<()> {
        let entry = self.find_user(username, UserLookup::AccountName).await?;
        self.session.modify(&entry.dn, "lockoutTime", "0").await?;
        info!(username, "user unlocked");
        Ok(())
    }

    /// Replaces a user's password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the user does not exist and
    /// [`Error::DirectoryRejected`] if the password violates the directory's policy.
    pub async fn reset_password(&self, username: &str, new_password: &str) -> Result<()> {
        let entry = self.find_user(username, UserLookup::AccountName).await?;
        self.session
            .modify(&entry.dn, "unicodePwd", encode_password(new_password))
            .await?;
        info!(username, "password reset");
        Ok(())
    }
}
