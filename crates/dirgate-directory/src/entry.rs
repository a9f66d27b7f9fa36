//! Entry and change types exchanged with the directory backend.

use serde::Serialize;
use std::collections::HashMap;

/// Read-only projection of a search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values keep server order).
    pub attributes: HashMap<String, Vec<String>>,
    /// Attributes whose values are not valid UTF-8, such as `objectSid` or `objectGUID`.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub binary_attributes: HashMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    /// Creates an entry with no attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
            binary_attributes: HashMap::new(),
        }
    }

    /// Adds a value to an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Adds a binary value to an attribute.
    #[must_use]
    pub fn with_binary_attribute(mut self, name: impl Into<String>, value: Vec<u8>) -> Self {
        self.binary_attributes
            .entry(name.into())
            .or_default()
            .push(value);
        self
    }

    /// All values of an attribute. Attribute names are matched case-insensitively.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        lookup(&self.attributes, attribute).map(Vec::as_slice)
    }

    /// All binary values of an attribute.
    #[must_use]
    pub fn binary_values(&self, attribute: &str) -> Option<&[Vec<u8>]> {
        lookup(&self.binary_attributes, attribute).map(Vec::as_slice)
    }

    /// First binary value of an attribute.
    #[must_use]
    pub fn first_binary(&self, attribute: &str) -> Option<&[u8]> {
        self.binary_values(attribute)
            .and_then(|values| values.first().map(Vec::as_slice))
    }

    /// First value of an attribute.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Whether any value of `objectClass` equals `class`.
    #[must_use]
    pub fn has_object_class(&self, class: &str) -> bool {
        self.values("objectClass")
            .is_some_and(|classes| classes.iter().any(|c| c.eq_ignore_ascii_case(class)))
    }
}

fn lookup<'a, V>(map: &'a HashMap<String, V>, attribute: &str) -> Option<&'a V> {
    map.get(attribute).or_else(|| {
        map.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values)
    })
}

/// Raw attribute value. Most values are text; `unicodePwd` is binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeValue(Vec<u8>);

impl AttributeValue {
    /// Raw bytes sent to the directory.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The value as UTF-8 text, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Consumes the value, returning the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// Replace-style modification of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    /// Entry being modified.
    pub dn: String,
    /// Attribute being replaced.
    pub attribute: String,
    /// Replacement value.
    pub value: AttributeValue,
}

impl AttributeChange {
    /// Builds a replace change.
    #[must_use]
    pub fn replace(
        dn: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            dn: dn.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Ordered attribute set for entry creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    attributes: Vec<(String, Vec<AttributeValue>)>,
}

impl AttributeSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single-valued attribute.
    #[must_use]
    pub fn with(self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.with_values(name, [value.into()])
    }

    /// Adds values to an attribute, merging with earlier values of the same name.
    #[must_use]
    pub fn with_values<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        let name = name.into();
        let values = values.into_iter().map(Into::into);
        match self
            .attributes
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => existing.extend(values),
            None => self.attributes.push((name, values.collect())),
        }
        self
    }

    /// Values of an attribute, matched case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[AttributeValue]> {
        self.attributes
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// Iterates attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[AttributeValue])> + '_ {
        self.attributes
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// True if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Names of attributes that are present but carry no value.
    pub(crate) fn empty_attributes(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes
            .iter()
            .filter(|(_, values)| values.is_empty())
            .map(|(name, _)| name.as_str())
    }
}
