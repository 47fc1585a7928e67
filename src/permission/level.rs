//! Caller trust levels.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ordered trust level: `Read < Write < Sign < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrustLevel {
    Read,
    Write,
    Sign,
    Admin,
}

impl TrustLevel {
    pub const ALL: [TrustLevel; 4] = [
        TrustLevel::Read,
        TrustLevel::Write,
        TrustLevel::Sign,
        TrustLevel::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Read => "read",
            TrustLevel::Write => "write",
            TrustLevel::Sign => "sign",
            TrustLevel::Admin => "admin",
        }
    }

    /// Whether a caller at this level may run an operation requiring `required`.
    pub fn permits(&self, required: TrustLevel) -> bool {
        *self >= required
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown trust level '{0}' (expected read, write, sign or admin)")]
pub struct ParseLevelError(pub String);

impl FromStr for TrustLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(TrustLevel::Read),
            "write" => Ok(TrustLevel::Write),
            "sign" => Ok(TrustLevel::Sign),
            "admin" => Ok(TrustLevel::Admin),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl Serialize for TrustLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TrustLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(TrustLevel::Read < TrustLevel::Write);
        assert!(TrustLevel::Write < TrustLevel::Sign);
        assert!(TrustLevel::Sign < TrustLevel::Admin);
        assert!(TrustLevel::Admin.permits(TrustLevel::Read));
        assert!(!TrustLevel::Write.permits(TrustLevel::Sign));
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("ADMIN".parse::<TrustLevel>(), Ok(TrustLevel::Admin));
        assert_eq!(" Sign ".parse::<TrustLevel>(), Ok(TrustLevel::Sign));
        assert!("root".parse::<TrustLevel>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&TrustLevel::Write).unwrap(), "\"write\"");
        let level: TrustLevel = serde_json::from_str("\"Read\"").unwrap();
        assert_eq!(level, TrustLevel::Read);
        assert!(serde_json::from_str::<TrustLevel>("\"superuser\"").is_err());
    }
}
