//! In-memory directory shared by the integration tests.
//!
//! Seeds itself from `tests/fixtures/directory.json`, answers the same filters the gateway
//! issues, enforces DN uniqueness and records every call so tests can assert on traffic.

#![allow(dead_code)]

use async_trait::async_trait;
use dirgate_core::{Error, Result, ServiceIdentity};
use dirgate_directory::{
    AttributeChange, AttributeSet, DirectoryConfig, DirectoryConnection, DirectoryConnector,
    DirectoryEntry, DistinguishedName,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Deserialize)]
struct Fixture {
    base_dn: String,
    service: ServiceFixture,
    entries: Vec<EntryFixture>,
}

#[derive(Deserialize)]
struct ServiceFixture {
    bind_name: String,
    password: String,
}

#[derive(Deserialize)]
struct EntryFixture {
    dn: String,
    attributes: HashMap<String, Vec<String>>,
    #[serde(default)]
    password: Option<String>,
}

struct StoredEntry {
    dn: DistinguishedName,
    attributes: HashMap<String, Vec<String>>,
    password: Option<String>,
}

impl StoredEntry {
    fn values(&self, attribute: &str) -> Option<&Vec<String>> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values)
    }

    fn has_value(&self, attribute: &str, value: &str) -> bool {
        self.values(attribute)
            .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
    }

    fn set(&mut self, attribute: &str, values: Vec<String>) {
        let key = self
            .attributes
            .keys()
            .find(|name| name.eq_ignore_ascii_case(attribute))
            .cloned()
            .unwrap_or_else(|| attribute.to_string());
        self.attributes.insert(key, values);
    }

    fn to_entry(&self) -> DirectoryEntry {
        DirectoryEntry {
            dn: self.dn.to_string(),
            attributes: self.attributes.clone(),
            binary_attributes: HashMap::new(),
        }
    }
}

/// Calls observed by the fake.
#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub connects: usize,
    pub binds: Vec<String>,
    pub searches: Vec<String>,
    pub modifies: Vec<AttributeChange>,
    pub adds: Vec<String>,
    pub deletes: Vec<String>,
    pub renames: Vec<String>,
}

struct State {
    service: (String, String),
    entries: Vec<StoredEntry>,
    calls: Calls,
    generation: u64,
    hang: bool,
    unreachable: bool,
    connect_delay: Option<Duration>,
}

impl State {
    fn find(&self, dn: &DistinguishedName) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.dn.as_str().eq_ignore_ascii_case(dn.as_str()))
    }
}

/// Handle to the in-memory directory. Clones share state.
#[derive(Clone)]
pub struct FakeDirectory {
    state: Arc<Mutex<State>>,
    base_dn: DistinguishedName,
}

impl FakeDirectory {
    /// Loads the seeded directory.
    pub fn load() -> Self {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("directory.json");
        let json = fs::read_to_string(&path).unwrap_or_else(|e| {
            panic!("Failed to read directory fixture at {}: {}", path.display(), e)
        });
        let fixture: Fixture = serde_json::from_str(&json)
            .unwrap_or_else(|e| panic!("Failed to parse directory fixture: {}", e));

        let entries = fixture
            .entries
            .into_iter()
            .map(|entry| StoredEntry {
                dn: DistinguishedName::parse(&entry.dn).expect("fixture DN"),
                attributes: entry.attributes,
                password: entry.password,
            })
            .collect();

        Self {
            state: Arc::new(Mutex::new(State {
                service: (fixture.service.bind_name, fixture.service.password),
                entries,
                calls: Calls::default(),
                generation: 0,
                hang: false,
                unreachable: false,
                connect_delay: None,
            })),
            base_dn: DistinguishedName::parse(&fixture.base_dn).expect("fixture base DN"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake directory state")
    }

    /// Gateway configuration pointing at this directory.
    pub fn config(&self) -> DirectoryConfig {
        let (bind_name, password) = self.lock().service.clone();
        DirectoryConfig::new(
            "ldap://fake.corp.example.com",
            ServiceIdentity::new(bind_name, password),
            self.base_dn.clone(),
        )
        .expect("fake config")
        .with_principal_suffix("corp.example.com")
        .with_operation_timeout_secs(5)
    }

    /// Connector handing out connections to this directory.
    pub fn connector(&self) -> Arc<dyn DirectoryConnector> {
        Arc::new(self.clone())
    }

    /// Snapshot of the recorded calls.
    pub fn calls(&self) -> Calls {
        self.lock().calls.clone()
    }

    /// Drops every open connection: they report closed and their next request fails at the
    /// transport level.
    pub fn sever_connections(&self) {
        self.lock().generation += 1;
    }

    /// Makes every request (and connect) hang until cleared.
    pub fn set_hang(&self, hang: bool) {
        self.lock().hang = hang;
    }

    /// Makes every connect take `delay` before it completes.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = Some(delay);
    }

    /// Makes new connections fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Current attributes of an entry.
    pub fn entry(&self, dn: &str) -> Option<DirectoryEntry> {
        let dn = DistinguishedName::parse(dn).ok()?;
        let state = self.lock();
        state.find(&dn).map(|index| state.entries[index].to_entry())
    }

    /// Stored plaintext password of an account, as decoded from `unicodePwd`.
    pub fn password_of(&self, account_name: &str) -> Option<String> {
        self.lock()
            .entries
            .iter()
            .find(|entry| entry.has_value("sAMAccountName", account_name))
            .and_then(|entry| entry.password.clone())
    }

    async fn stall_if_hung(state: &Arc<Mutex<State>>) {
        let hang = state.lock().expect("fake directory state").hang;
        if hang {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl DirectoryConnector for FakeDirectory {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>> {
        Self::stall_if_hung(&self.state).await;
        let delay = self.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        if state.unreachable {
            return Err(Error::DirectoryUnreachable(
                "connect failed: connection refused".into(),
            ));
        }
        state.calls.connects += 1;
        Ok(Box::new(FakeConnection {
            state: Arc::clone(&self.state),
            generation: state.generation,
            bound: false,
        }))
    }
}

struct FakeConnection {
    state: Arc<Mutex<State>>,
    generation: u64,
    bound: bool,
}

impl FakeConnection {
    /// Waits out a hang, then checks the connection is alive and bound.
    async fn enter(&self, needs_bind: bool) -> Result<MutexGuard<'_, State>> {
        FakeDirectory::stall_if_hung(&self.state).await;
        let state = self.state.lock().expect("fake directory state");
        if state.generation != self.generation {
            return Err(Error::DirectoryUnreachable(
                "connection reset by peer".into(),
            ));
        }
        if needs_bind && !self.bound {
            return Err(Error::DirectoryRejected(
                "request failed with result code 1: bind required".into(),
            ));
        }
        Ok(state)
    }
}

#[async_trait]
impl DirectoryConnection for FakeConnection {
    async fn simple_bind(&mut self, name: &str, password: &str) -> Result<()> {
        let accepted = {
            let mut state = self.enter(false).await?;
            state.calls.binds.push(name.to_string());
            if state.service.0 == name && state.service.1 == password {
                true
            } else {
                let account = name.rsplit('\\').next().unwrap_or(name);
                state.entries.iter().any(|entry| {
                    let named = entry.dn.as_str().eq_ignore_ascii_case(name)
                        || entry.has_value("userPrincipalName", name)
                        || (name.contains('\\') && entry.has_value("sAMAccountName", account));
                    named && entry.password.as_deref() == Some(password)
                })
            }
        };
        if !accepted {
            return Err(Error::DirectoryUnreachable(
                "bind failed with result code 49: invalid credentials".into(),
            ));
        }
        self.bound = true;
        Ok(())
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        _attributes: &[&'static str],
    ) -> Result<Vec<DirectoryEntry>> {
        let mut state = self.enter(true).await?;
        state.calls.searches.push(filter.to_string());
        let base = DistinguishedName::parse(base_dn)
            .map_err(|err| Error::SchemaViolation(format!("invalid base: {err}")))?;
        if state.find(&base).is_none() {
            return Err(Error::NotFound(
                "search failed with result code 32: no such object".into(),
            ));
        }
        let filter = Filter::parse(filter);
        Ok(state
            .entries
            .iter()
            .filter(|entry| entry.dn.is_within(&base) && filter.matches(entry))
            .map(StoredEntry::to_entry)
            .collect())
    }

    async fn modify(&mut self, change: &AttributeChange) -> Result<()> {
        let mut state = self.enter(true).await?;
        state.calls.modifies.push(change.clone());
        let dn = DistinguishedName::parse(&change.dn)
            .map_err(|err| Error::SchemaViolation(err.to_string()))?;
        let index = state.find(&dn).ok_or_else(|| {
            Error::NotFound("modify failed with result code 32: no such object".into())
        })?;
        let entry = &mut state.entries[index];
        if change.attribute.eq_ignore_ascii_case("unicodePwd") {
            entry.password = Some(decode_password(change.value.as_bytes()));
        } else {
            let text = change.value.as_text().unwrap_or_default().to_string();
            entry.set(&change.attribute, vec![text]);
        }
        Ok(())
    }

    async fn add(&mut self, dn: &str, attributes: &AttributeSet) -> Result<()> {
        let mut state = self.enter(true).await?;
        state.calls.adds.push(dn.to_string());
        let dn = DistinguishedName::parse(dn)
            .map_err(|err| Error::SchemaViolation(err.to_string()))?;
        if state.find(&dn).is_some() {
            return Err(Error::AlreadyExists(
                "add failed with result code 68: entry already exists".into(),
            ));
        }
        let parent_exists = dn.parent().is_some_and(|parent| state.find(&parent).is_some());
        if !parent_exists {
            return Err(Error::NotFound(
                "add failed with result code 32: no such object".into(),
            ));
        }

        let mut stored = StoredEntry {
            dn,
            attributes: HashMap::new(),
            password: None,
        };
        for (name, values) in attributes.iter() {
            if name.eq_ignore_ascii_case("unicodePwd") {
                stored.password = values.first().map(|v| decode_password(v.as_bytes()));
            } else {
                let text = values
                    .iter()
                    .map(|v| v.as_text().unwrap_or_default().to_string())
                    .collect();
                stored.set(name, text);
            }
        }
        state.entries.push(stored);
        Ok(())
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        let mut state = self.enter(true).await?;
        state.calls.deletes.push(dn.to_string());
        let dn = DistinguishedName::parse(dn)
            .map_err(|err| Error::SchemaViolation(err.to_string()))?;
        let index = state.find(&dn).ok_or_else(|| {
            Error::NotFound("delete failed with result code 32: no such object".into())
        })?;
        let has_children = state
            .entries
            .iter()
            .any(|entry| entry.dn != dn && entry.dn.is_within(&dn));
        if has_children {
            return Err(Error::DirectoryRejected(
                "delete failed with result code 66: not allowed on non-leaf".into(),
            ));
        }
        state.entries.remove(index);
        Ok(())
    }

    async fn rename(&mut self, dn: &str, new_rdn: &str, new_superior: &str) -> Result<()> {
        let mut state = self.enter(true).await?;
        state.calls.renames.push(format!("{dn} -> {new_rdn},{new_superior}"));
        let dn = DistinguishedName::parse(dn)
            .map_err(|err| Error::SchemaViolation(err.to_string()))?;
        let target = DistinguishedName::parse(format!("{new_rdn},{new_superior}"))
            .map_err(|err| Error::SchemaViolation(err.to_string()))?;
        let superior = DistinguishedName::parse(new_superior)
            .map_err(|err| Error::SchemaViolation(err.to_string()))?;

        let index = state.find(&dn).ok_or_else(|| {
            Error::NotFound("rename failed with result code 32: no such object".into())
        })?;
        if state.find(&superior).is_none() {
            return Err(Error::NotFound(
                "rename failed with result code 32: no such object".into(),
            ));
        }
        if state.find(&target).is_some() {
            return Err(Error::AlreadyExists(
                "rename failed with result code 68: entry already exists".into(),
            ));
        }
        state.entries[index].dn = target;
        Ok(())
    }

    async fn unbind(&mut self) -> Result<()> {
        self.bound = false;
        Ok(())
    }

    fn is_closed(&mut self) -> bool {
        self.state.lock().expect("fake directory state").generation != self.generation
    }
}

/// Reverses the quoted UTF-16LE password encoding.
pub fn decode_password(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let quoted = String::from_utf16(&units).expect("UTF-16 password");
    quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .expect("quoted password")
        .to_string()
}

/// The subset of RFC 4515 the gateway emits: conjunctions of equality matches.
enum Filter {
    And(Vec<Filter>),
    Equals(String, String),
}

impl Filter {
    fn parse(input: &str) -> Self {
        let inner = input
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or_else(|| panic!("unsupported filter `{input}`"));
        if let Some(rest) = inner.strip_prefix('&') {
            return Self::And(split_groups(rest).into_iter().map(Self::parse).collect());
        }
        let (attribute, value) = inner
            .split_once('=')
            .unwrap_or_else(|| panic!("unsupported filter `{input}`"));
        Self::Equals(attribute.to_string(), unescape(value))
    }

    fn matches(&self, entry: &StoredEntry) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|part| part.matches(entry)),
            Self::Equals(attribute, value) => entry.has_value(attribute, value),
        }
    }
}

fn split_groups(input: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (index, ch) in input.char_indices() {
        match ch {
            '(' => {
                if depth == 0 {
                    start = index;
                }
                depth += 1;
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    groups.push(&input[start..=index]);
                }
            }
            _ => {}
        }
    }
    groups
}

fn unescape(value: &str) -> String {
    let mut bytes = Vec::with_capacity(value.len());
    let raw = value.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && i + 2 < raw.len() {
            let hex = std::str::from_utf8(&raw[i + 1..i + 3]).expect("escape");
            bytes.push(u8::from_str_radix(hex, 16).expect("hex escape"));
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(bytes).expect("UTF-8 filter value")
}
