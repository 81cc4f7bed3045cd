use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hex characters kept from a v4 uuid
const ID_LEN: usize = 12;

/// Stable identifier of a logical document, independent of its file name.
///
/// Minted on New and Save As, carried through Save and Load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn mint() -> Self {
        let mut hex = uuid::Uuid::new_v4().simple().to_string();
        hex.truncate(ID_LEN);
        Self(hex)
    }

    /// Wrap an identifier read from storage; blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_are_short_lowercase_hex() {
        let id = DocumentId::mint();

        assert_eq!(id.as_str().len(), ID_LEN);
        assert!(
            id.as_str()
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        );
    }

    #[test]
    fn minted_ids_differ() {
        assert_ne!(DocumentId::mint(), DocumentId::mint());
    }

    #[test]
    fn parse_rejects_blank_identifiers() {
        assert_eq!(DocumentId::parse("   "), None);
        assert_eq!(DocumentId::parse(" abc123 ").unwrap().as_str(), "abc123");
    }

    #[test]
    fn serializes_as_a_bare_string() {
        let id = DocumentId::parse("abc123").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    }
}
