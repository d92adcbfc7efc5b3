use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of an object in a project document.
///
/// Xcode writes 24 upper-case hex digits, but other generators use longer alphanumeric tokens, so
/// any non-empty ASCII alphanumeric token is accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wraps `raw` when it is a well-formed identifier token.
    pub fn parse(raw: &str) -> Option<Self> {
        if Self::is_token(raw) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    /// Identifier spelled as the upper-case hex digits of `bytes`, the form Xcode writes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.iter().map(|b| format!("{b:02X}")).collect())
    }

    pub fn is_token(raw: &str) -> bool {
        !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
