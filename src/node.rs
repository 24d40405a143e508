use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Attributes that Rundeck treats as first-class node fields rather than
/// free-form attributes.
pub const STANDARD_FIELDS: [&str; 6] = [
    "nodename",
    "hostname",
    "username",
    "osFamily",
    "tags",
    "description",
];

/// One discovered VM or container, flattened to string attributes.
///
/// Keys keep their insertion order so rendered output lists the standard
/// fields first, followed by the Proxmox-specific attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRecord(IndexMap<String, String>);

impl NodeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an attribute by its exact (case-sensitive) name.
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.0.get(attribute).map(String::as_str)
    }

    /// Insert or replace an attribute. Replacing keeps the original position.
    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.0.insert(attribute.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Attributes that are not one of [`STANDARD_FIELDS`], in insertion order.
    pub fn extra_attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| !STANDARD_FIELDS.contains(k))
    }
}

impl<K, V> FromIterator<(K, V)> for NodeRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Overwrite the `username` attribute of every record.
pub fn apply_default_username(nodes: &mut [NodeRecord], username: &str) {
    for node in nodes {
        node.insert("username", username);
    }
}
