//! Computer accounts and the organizational units they are placed in.

use serde::Serialize;
use tracing::{info, warn};

use crate::dn::DistinguishedName;
use crate::entry::{AttributeSet, DirectoryEntry};
use crate::filter::{computer_filter, organizational_unit_filter};
use crate::operations::{ensure_absent, require_name, DirectoryOperations};
use crate::users::AccountControl;
use crate::Result;
use dirgate_core::Error;

const COMPUTER_OBJECT_CLASSES: [&str; 5] =
    ["top", "person", "organizationalPerson", "user", "computer"];

/// Typed view of a computer entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Computer {
    /// Distinguished name of the entry.
    pub dn: DistinguishedName,
    /// Common name.
    pub name: String,
    /// Machine account name (`NAME$`).
    pub account_name: Option<String>,
    /// DNS host name.
    pub dns_host_name: Option<String>,
    /// Operating system as reported by the machine.
    pub operating_system: Option<String>,
    /// Account control flags.
    pub control: AccountControl,
}

impl Computer {
    /// Projects a directory entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the DN cannot be parsed.
    pub fn from_entry(entry: &DirectoryEntry) -> Result<Self> {
        let dn = DistinguishedName::parse(&entry.dn)?;
        let name = entry
            .first("cn")
            .or_else(|| dn.get("CN"))
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            name,
            account_name: entry.first("sAMAccountName").map(str::to_string),
            dns_host_name: entry.first("dNSHostName").map(str::to_string),
            operating_system: entry.first("operatingSystem").map(str::to_string),
            control: entry
                .first("userAccountControl")
                .and_then(|value| value.parse().ok())
                .map(AccountControl::from_bits)
                .unwrap_or_default(),
            dn,
        })
    }

    /// Organizational unit holding the computer.
    #[must_use]
    pub fn organizational_unit(&self) -> Option<DistinguishedName> {
        self.dn.parent()
    }
}

/// Typed view of an organizational unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationalUnit {
    /// Distinguished name of the unit.
    pub dn: DistinguishedName,
    /// Unit name (`ou`).
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
}

impl OrganizationalUnit {
    /// Projects a directory entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the DN cannot be parsed.
    pub fn from_entry(entry: &DirectoryEntry) -> Result<Self> {
        let dn = DistinguishedName::parse(&entry.dn)?;
        let name = entry
            .first("ou")
            .or_else(|| dn.get("OU"))
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            name,
            description: entry.first("description").map(str::to_string),
            dn,
        })
    }
}

/// Machine account name: upper-cased with a trailing `$`.
fn machine_account_name(name: &str) -> String {
    format!("{}$", name.to_uppercase())
}

impl DirectoryOperations {
    /// Looks up a computer entry by common name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no computer matches.
    pub async fn find_computer(&self, name: &str) -> Result<DirectoryEntry> {
        let name = require_name("computer", name)?;
        self.session
            .search_unique(&computer_filter(name), None)
            .await
            .map_err(|err| match err {
                Error::NotFound(_) => Error::NotFound(format!("computer `{name}` not found")),
                other => other,
            })
    }

    /// Typed view of the computer with the given common name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no computer matches.
    pub async fn computer_profile(&self, name: &str) -> Result<Computer> {
        let entry = self.find_computer(name).await?;
        Computer::from_entry(&entry)
    }

    /// Creates a workstation account under `organizational_unit` and returns its DN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if a computer with that name exists or the server
    /// reports a collision, and [`Error::NotFound`] if the unit does not exist.
    pub async fn create_computer(
        &self,
        name: &str,
        organizational_unit: &DistinguishedName,
    ) -> Result<DistinguishedName> {
        let name = require_name("computer", name)?;
        ensure_absent(
            self.find_computer(name).await,
            format!("computer `{name}` already exists"),
        )?;

        let dn = DistinguishedName::child(organizational_unit, "CN", name);
        let attributes = AttributeSet::new()
            .with_values("objectClass", COMPUTER_OBJECT_CLASSES)
            .with("cn", name)
            .with("sAMAccountName", machine_account_name(name))
            .with(
                "userAccountControl",
                AccountControl::NEW_COMPUTER.to_attribute(),
            );

        self.session.add(&dn, &attributes).await?;
        info!(computer = name, dn = dn.as_str(), "computer created");
        Ok(dn)
    }

    /// Deletes the computer with the given common name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no computer matches.
    pub async fn delete_computer(&self, name: &str) -> Result<()> {
        let entry = self.find_computer(name).await?;
        self.session.delete(&entry.dn).await
    }

    /// Moves a computer entry to `target`, which names the full new DN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist and
    /// [`Error::TargetConflict`] if `target` is occupied.
    pub async fn move_computer(
        &self,
        dn: &DistinguishedName,
        target: &DistinguishedName,
    ) -> Result<()> {
        self.session.rename(dn, target).await
    }

    /// Organizational units under the base DN, optionally only those whose DN contains
    /// `containing` as a case-sensitive substring (`"PC"` keeps `OU=PC`, `OU=PCs` and
    /// `OU=PC-Lab`). Entries that cannot be projected are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn list_organizational_units(
        &self,
        containing: Option<&str>,
    ) -> Result<Vec<OrganizationalUnit>> {
        let entries = self
            .session
            .search(organizational_unit_filter(), None)
            .await?;
        Ok(entries
            .iter()
            .filter(|entry| containing.map_or(true, |value| entry.dn.contains(value)))
            .filter_map(|entry| match OrganizationalUnit::from_entry(entry) {
                Ok(unit) => Some(unit),
                Err(err) => {
                    warn!(dn = %entry.dn, error = %err, "skipping unreadable organizational unit");
                    None
                }
            })
            .collect())
    }
}
