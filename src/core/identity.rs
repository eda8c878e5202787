//! Layer 1: Identity atoms
//!
//! DatabaseId, MachineId, TableId, PeerId: stable UUID keys
//! NameString: validated user-facing name
//! ServerTag: machine tag
//! ContentDigest: SHA-256 of canonical metadata

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{CoreError, InvalidId, InvalidName};

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident, $variant:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Mint a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            pub fn parse_str(s: &str) -> Result<Self, CoreError> {
                parse_uuid_id(s, |raw, reason| InvalidId::$variant { raw, reason }).map(Self)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                $name::parse_str(&s)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Database identifier.
    DatabaseId,
    Database
);
uuid_id!(
    /// Machine (server) identifier. Stable across restarts.
    MachineId,
    Machine
);
uuid_id!(
    /// Table identifier (a "namespace" in the replication layer).
    TableId,
    Table
);
uuid_id!(
    /// Connection-scoped peer identifier. Changes every time a process starts.
    PeerId,
    Peer
);

fn parse_uuid_id<F>(raw: &str, invalid: F) -> Result<Uuid, CoreError>
where
    F: FnOnce(String, String) -> InvalidId,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(raw.to_string(), "empty".into()).into());
    }
    Uuid::parse_str(trimmed).map_err(|err| invalid(raw.to_string(), err.to_string()).into())
}

const DELETED_DATABASE_NAME: &str = "__deleted_database__";

fn validate_name(kind: &'static str, s: &str) -> Result<(), CoreError> {
    if s.is_empty() {
        return Err(InvalidName {
            kind,
            raw: s.to_string(),
            reason: "empty".into(),
        }
        .into());
    }
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(InvalidName {
            kind,
            raw: s.to_string(),
            reason: format!("contains `{c}`; only A-Z, a-z, 0-9 and _ are allowed"),
        }
        .into());
    }
    Ok(())
}

/// Name of a database, table or server - `[A-Za-z0-9_]+`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NameString(String);

impl NameString {
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        validate_name("name", &s)?;
        Ok(Self(s))
    }

    /// Display name substituted for a database that was deleted out from under
    /// a table that still references it.
    pub fn deleted_database() -> Self {
        Self(DELETED_DATABASE_NAME.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NameString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameString({:?})", self.0)
    }
}

impl fmt::Display for NameString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for NameString {
    type Error = CoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        NameString::parse(s)
    }
}

impl From<NameString> for String {
    fn from(n: NameString) -> String {
        n.0
    }
}

/// Server tag used for replica placement.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerTag(String);

impl ServerTag {
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into().trim().to_string();
        validate_name("server tag", &s)?;
        Ok(Self(s))
    }

    /// Every server carries this tag unless it is explicitly removed.
    pub fn default_tag() -> Self {
        Self("default".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerTag({:?})", self.0)
    }
}

impl fmt::Display for ServerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ServerTag {
    type Error = CoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        ServerTag::parse(s)
    }
}

impl From<ServerTag> for String {
    fn from(t: ServerTag) -> String {
        t.0
    }
}

/// SHA-256 digest of canonical metadata.
///
/// Peers compare digests to skip syncing values that already converged.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        if s.len() != 64 {
            return Err(InvalidId::Digest {
                raw: s.to_string(),
                reason: format!("must be 64 hex chars (got {})", s.len()),
            }
            .into());
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(|_| InvalidId::Digest {
                raw: s.to_string(),
                reason: "contains invalid UTF-8".into(),
            })?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| InvalidId::Digest {
                raw: s.to_string(),
                reason: format!("contains invalid hex: {}", hex),
            })?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
