use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel stored for a restricted package without a usage limit
pub const UNSET_LIMIT: i64 = -1;

/// Identifier of an installed application (e.g. `com.example.reader`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PackageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_plain_string() {
        let id = PackageId::from("com.example.a");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"com.example.a\"");

        let parsed: PackageId = serde_json::from_str("\"com.example.b\"").unwrap();
        assert_eq!(parsed.as_str(), "com.example.b");
    }
}
