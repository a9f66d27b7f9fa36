//! Search filters used by the account and computer operations.

use ldap3::ldap_escape;

/// Attribute a user lookup matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserLookup {
    /// Logon name (`sAMAccountName`).
    #[default]
    AccountName,
    /// Display name as listed by the directory (`name`).
    DisplayName,
    /// Common name (`cn`).
    CommonName,
}

impl UserLookup {
    /// Directory attribute backing this lookup.
    #[must_use]
    pub const fn attribute(self) -> &'static str {
        match self {
            Self::AccountName => "sAMAccountName",
            Self::DisplayName => "name",
            Self::CommonName => "cn",
        }
    }
}

/// `(&(objectclass=user)(<attr>=<name>))`
#[must_use]
pub fn user_filter(name: &str, lookup: UserLookup) -> String {
    format!(
        "(&(objectclass=user)({}={}))",
        lookup.attribute(),
        ldap_escape(name)
    )
}

/// All user-class entries, computers included.
#[must_use]
pub fn all_users_filter() -> &'static str {
    "(objectclass=user)"
}

/// Computers are user-class objects; they are told apart by their common name.
#[must_use]
pub fn computer_filter(name: &str) -> String {
    format!("(&(objectclass=user)(cn={}))", ldap_escape(name))
}

/// All organizational units.
#[must_use]
pub fn organizational_unit_filter() -> &'static str {
    "(objectClass=organizationalUnit)"
}
