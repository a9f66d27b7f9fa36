//! Distinguished names for directory entries.
//!
//! Entries are addressed by DN everywhere in the gateway: users are created under a users
//! container, computers under an organizational unit, and moves are expressed as a new DN that
//! is split into a leading RDN and a new superior for the modify-DN request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use dirgate_core::Error as CoreError;

/// Errors raised while parsing distinguished names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistinguishedNameError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component was malformed (empty, or without `=`).
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// A component had nothing to the left of `=`.
    #[error("distinguished name component missing attribute: {0}")]
    MissingAttribute(String),
    /// A component had nothing to the right of `=`.
    #[error("distinguished name component missing value for attribute {0}")]
    MissingValue(String),
    /// The input ended inside an escape sequence.
    #[error("distinguished name contains an unterminated escape sequence")]
    UnterminatedEscape,
}

impl From<DistinguishedNameError> for CoreError {
    fn from(err: DistinguishedNameError) -> Self {
        CoreError::InvalidRequest(err.to_string())
    }
}

/// Single `attribute=value` pair, e.g. `CN=jdoe` or `OU=Workstations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeDistinguishedName {
    attribute: String,
    value: String,
}

impl RelativeDistinguishedName {
    /// Create a relative distinguished name from an unescaped value.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Attribute type, as written (`CN`, `OU`, `DC`, ...).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Unescaped value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Case-insensitive attribute comparison.
    #[must_use]
    pub fn matches_attribute(&self, attribute: &str) -> bool {
        self.attribute.eq_ignore_ascii_case(attribute)
    }
}

impl fmt::Display for RelativeDistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute, escape(&self.value))
    }
}

/// Parsed distinguished name.
///
/// Keeps a canonical string (escaped, no padding around separators) alongside the parsed RDN
/// sets. Comparison helpers are case-insensitive because directory servers treat DNs that way;
/// `PartialEq` compares the canonical form exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinguishedName {
    raw: String,
    rdns: Vec<Vec<RelativeDistinguishedName>>,
}

impl DistinguishedName {
    /// Parses a distinguished name.
    ///
    /// # Errors
    ///
    /// Returns [`DistinguishedNameError`] if the input is empty or malformed.
    pub fn parse(input: impl AsRef<str>) -> std::result::Result<Self, DistinguishedNameError> {
        let raw = input.as_ref().trim();
        if raw.is_empty() {
            return Err(DistinguishedNameError::Empty);
        }

        let mut rdns = Vec::new();
        for component in split_escaped(raw, ',')? {
            let mut rdn_components = Vec::new();
            for part in split_escaped(&component, '+')? {
                let (attribute, value) = split_attribute_value(&part)?;
                rdn_components.push(RelativeDistinguishedName::new(attribute, value));
            }
            rdns.push(rdn_components);
        }

        Ok(Self::from_rdns(rdns))
    }

    /// Builds `<attribute>=<value>,<parent>`, escaping `value`.
    #[must_use]
    pub fn child(parent: &DistinguishedName, attribute: &str, value: &str) -> Self {
        parent
            .clone()
            .with_prefix(RelativeDistinguishedName::new(attribute, value))
    }

    fn from_rdns(rdns: Vec<Vec<RelativeDistinguishedName>>) -> Self {
        Self {
            raw: rdns_to_string(&rdns),
            rdns,
        }
    }

    /// Canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// All attribute/value pairs in order.
    pub fn components(&self) -> impl Iterator<Item = &RelativeDistinguishedName> + '_ {
        self.rdns.iter().flat_map(|rdn| rdn.iter())
    }

    /// Value of the first component with the given attribute type.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.components()
            .find(|rdn| rdn.matches_attribute(attribute))
            .map(RelativeDistinguishedName::value)
    }

    /// Leading RDN in string form (e.g. `CN=PC1`), as a modify-DN request expects it.
    #[must_use]
    pub fn leading_rdn(&self) -> String {
        self.rdns
            .first()
            .map(|rdn| {
                rdn.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("+")
            })
            .unwrap_or_default()
    }

    /// The DN with its leading RDN removed, or `None` for a single-component DN.
    #[must_use]
    pub fn parent(&self) -> Option<DistinguishedName> {
        if self.rdns.len() < 2 {
            return None;
        }
        Some(Self::from_rdns(self.rdns[1..].to_vec()))
    }

    /// True if this DN equals `base` or sits underneath it.
    #[must_use]
    pub fn is_within(&self, base: &DistinguishedName) -> bool {
        let Some(offset) = self.rdns.len().checked_sub(base.rdns.len()) else {
            return false;
        };
        self.rdns[offset..]
            .iter()
            .zip(base.rdns.iter())
            .all(|(ours, theirs)| rdn_set_eq(ours, theirs))
    }

    /// Prefix a new leaf RDN.
    #[must_use]
    pub fn with_prefix(mut self, rdn: RelativeDistinguishedName) -> Self {
        self.rdns.insert(0, vec![rdn]);
        self.raw = rdns_to_string(&self.rdns);
        self
    }

    /// Append another DN as suffix.
    #[must_use]
    pub fn join(mut self, suffix: &DistinguishedName) -> Self {
        self.rdns.extend(suffix.rdns.iter().cloned());
        self.raw = rdns_to_string(&self.rdns);
        self
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for DistinguishedName {
    type Err = DistinguishedNameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DistinguishedName> for String {
    fn from(value: DistinguishedName) -> Self {
        value.raw
    }
}

impl TryFrom<&str> for DistinguishedName {
    type Error = DistinguishedNameError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        Self::parse(value)
    }
}

fn rdn_set_eq(left: &[RelativeDistinguishedName], right: &[RelativeDistinguishedName]) -> bool {
    left.len() == right.len()
        && left.iter().all(|l| {
            right
                .iter()
                .any(|r| r.matches_attribute(&l.attribute) && r.value.eq_ignore_ascii_case(&l.value))
        })
}

/// Splits on `delimiter`, skipping escaped occurrences. Escapes are kept for the next stage.
fn split_escaped(
    input: &str,
    delimiter: char,
) -> std::result::Result<Vec<String>, DistinguishedNameError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escape = true;
            }
            c if c == delimiter => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }

    if escape {
        return Err(DistinguishedNameError::UnterminatedEscape);
    }

    parts.push(current.trim().to_string());
    if parts.iter().any(String::is_empty) {
        return Err(DistinguishedNameError::InvalidComponent(input.to_string()));
    }
    Ok(parts)
}

fn split_attribute_value(
    component: &str,
) -> std::result::Result<(String, String), DistinguishedNameError> {
    let idx = component
        .find('=')
        .ok_or_else(|| DistinguishedNameError::InvalidComponent(component.to_string()))?;
    let attribute = component[..idx].trim();
    let value_part = component[idx + 1..].trim_start();

    if attribute.is_empty() {
        return Err(DistinguishedNameError::MissingAttribute(
            component.to_string(),
        ));
    }
    if value_part.is_empty() {
        return Err(DistinguishedNameError::MissingValue(attribute.to_string()));
    }

    Ok((attribute.to_string(), unescape(value_part)?))
}

/// Resolves `\,` style escapes and `\2C` style hex pairs.
fn unescape(value: &str) -> std::result::Result<String, DistinguishedNameError> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let next = chars
            .next()
            .ok_or(DistinguishedNameError::UnterminatedEscape)?;
        match (next.to_digit(16), chars.peek().and_then(|c| c.to_digit(16))) {
            (Some(high), Some(low)) => {
                chars.next();
                // Both digits are < 16, so the pair always fits in a byte.
                bytes.push(u8::try_from(high * 16 + low).unwrap_or_default());
            }
            _ => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    String::from_utf8(bytes).map_err(|_| DistinguishedNameError::InvalidComponent(value.to_string()))
}

fn escape(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut escaped = String::with_capacity(value.len());

    for (idx, ch) in chars.iter().enumerate() {
        let is_first = idx == 0;
        let is_last = idx + 1 == chars.len();
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (is_first && (*ch == ' ' || *ch == '#'))
            || (is_last && *ch == ' ');

        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(*ch);
    }

    escaped
}

fn rdns_to_string(rdns: &[Vec<RelativeDistinguishedName>]) -> String {
    rdns.iter()
        .map(|rdn| {
            rdn.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}
