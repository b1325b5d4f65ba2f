//! Record identity using type-prefixed ULIDs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Record type prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityPrefix {
    /// Portal user (student, staff, instructor, ...)
    Usr,
    /// Host company
    Co,
    /// Internship position offered by a company
    Int,
    /// Student application to an internship
    App,
    /// Generated letter or certificate
    Doc,
    /// Supervisor visit
    Vis,
}

impl EntityPrefix {
    /// Get the string representation of the prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::Usr => "USR",
            EntityPrefix::Co => "CO",
            EntityPrefix::Int => "INT",
            EntityPrefix::App => "APP",
            EntityPrefix::Doc => "DOC",
            EntityPrefix::Vis => "VIS",
        }
    }

    /// Get all valid prefixes
    pub fn all() -> &'static [EntityPrefix] {
        &[
            EntityPrefix::Usr,
            EntityPrefix::Co,
            EntityPrefix::Int,
            EntityPrefix::App,
            EntityPrefix::Doc,
            EntityPrefix::Vis,
        ]
    }

    /// Database table holding records of this type
    pub fn table(&self) -> &'static str {
        match self {
            EntityPrefix::Usr => "users",
            EntityPrefix::Co => "companies",
            EntityPrefix::Int => "internships",
            EntityPrefix::App => "applications",
            EntityPrefix::Doc => "documents",
            EntityPrefix::Vis => "visits",
        }
    }

    /// Human readable noun, used in error messages
    pub fn noun(&self) -> &'static str {
        match self {
            EntityPrefix::Usr => "user",
            EntityPrefix::Co => "company",
            EntityPrefix::Int => "internship",
            EntityPrefix::App => "application",
            EntityPrefix::Doc => "document",
            EntityPrefix::Vis => "visit",
        }
    }
}

impl fmt::Display for EntityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USR" => Ok(EntityPrefix::Usr),
            "CO" => Ok(EntityPrefix::Co),
            "INT" => Ok(EntityPrefix::Int),
            "APP" => Ok(EntityPrefix::App),
            "DOC" => Ok(EntityPrefix::Doc),
            "VIS" => Ok(EntityPrefix::Vis),
            _ => Err(IdParseError::InvalidPrefix(s.to_string())),
        }
    }
}

/// A unique record identifier combining a type prefix and ULID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    prefix: EntityPrefix,
    ulid: Ulid,
}

impl EntityId {
    /// Create a new EntityId with the given prefix
    pub fn new(prefix: EntityPrefix) -> Self {
        Self {
            prefix,
            ulid: Ulid::new(),
        }
    }

    /// Get the record prefix
    pub fn prefix(&self) -> EntityPrefix {
        self.prefix
    }

    /// Get the ULID component
    pub fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse an EntityId from a string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    /// Prefix plus the first 8 ULID characters, for tables and file names
    pub fn short(&self) -> String {
        let ulid = self.ulid.to_string();
        format!("{}-{}", self.prefix, &ulid[..8])
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix_str, ulid_str) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        let prefix = prefix_str.parse()?;
        let ulid = Ulid::from_string(ulid_str)
            .map_err(|e| IdParseError::InvalidUlid(ulid_str.to_string(), e.to_string()))?;

        Ok(Self { prefix, ulid })
    }
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing record IDs
#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid record prefix: '{0}' (valid: USR, CO, INT, APP, DOC, VIS)")]
    InvalidPrefix(String),

    #[error("missing '-' delimiter in record ID: '{0}'")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}

/// A user-supplied reference to a record: full ID, ID prefix, or `APP@3` row number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Fully parsed ID
    Full(EntityId),
    /// Row number within the prefix's table
    Row(EntityPrefix, i64),
    /// Leading characters of an ID (must match exactly one record)
    Partial(String),
}

impl Reference {
    /// Parse a reference. `default_prefix` is used for bare `@N` references.
    pub fn parse(input: &str, default_prefix: EntityPrefix) -> Self {
        let input = input.trim();

        if let Ok(id) = input.parse::<EntityId>() {
            return Reference::Full(id);
        }

        if let Some((prefix, row)) = input.split_once('@') {
            let prefix = if prefix.is_empty() {
                Some(default_prefix)
            } else {
                prefix.parse().ok()
            };
            if let (Some(prefix), Ok(row)) = (prefix, row.parse::<i64>()) {
                return Reference::Row(prefix, row);
            }
        }

        Reference::Partial(input.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_roundtrip_display() {
        let id = EntityId::new(EntityPrefix::App);
        let s = id.to_string();
        assert!(s.starts_with("APP-"));
        assert_eq!(s.len(), 30);
        assert_eq!(s.parse::<EntityId>().unwrap(), id);
    }

    #[test]
    fn test_short_form() {
        let id: EntityId = "APP-01KCWY20F01B21V0G4E835NW3J".parse().unwrap();
        assert_eq!(id.short(), "APP-01KCWY20");
    }

    #[test]
    fn test_two_letter_prefix() {
        let id = EntityId::new(EntityPrefix::Co);
        assert!(id.to_string().starts_with("CO-"));
        assert_eq!(id.to_string().parse::<EntityId>().unwrap().prefix(), EntityPrefix::Co);
    }

    #[test]
    fn test_invalid_ids() {
        assert!(matches!(
            "REQ-01KCWY20F01B21V0G4E835NW3J".parse::<EntityId>(),
            Err(IdParseError::InvalidPrefix(_))
        ));
        assert!(matches!(
            "APP01KCWY20".parse::<EntityId>(),
            Err(IdParseError::MissingDelimiter(_))
        ));
        assert!(matches!(
            "APP-notaulid".parse::<EntityId>(),
            Err(IdParseError::InvalidUlid(_, _))
        ));
    }

    #[test]
    fn test_reference_parsing() {
        assert_eq!(
            Reference::parse("APP@3", EntityPrefix::Usr),
            Reference::Row(EntityPrefix::App, 3)
        );
        assert_eq!(
            Reference::parse("@7", EntityPrefix::App),
            Reference::Row(EntityPrefix::App, 7)
        );
        assert_eq!(
            Reference::parse("app-01kc", EntityPrefix::App),
            Reference::Partial("APP-01KC".to_string())
        );
        let id = EntityId::new(EntityPrefix::Vis);
        assert_eq!(
            Reference::parse(&id.to_string(), EntityPrefix::App),
            Reference::Full(id)
        );
    }
}
