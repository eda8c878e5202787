//! Layer 5: Cluster auth key
//!
//! Kept outside `ClusterMetadata`: it syncs as its own semilattice.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::crdt::{Crdt, Lww};
use super::error::{CoreError, InvalidName};
use super::meta::{ClusterVersion, Versioned};

const MAX_AUTH_KEY_LEN: usize = 2048;

/// Shared secret clients present on connect. Empty means "no key".
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthKey(String);

impl AuthKey {
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.len() > MAX_AUTH_KEY_LEN {
            return Err(InvalidName {
                kind: "auth key",
                raw: String::new(),
                reason: format!("longer than {MAX_AUTH_KEY_LEN} bytes"),
            }
            .into());
        }
        Ok(Self(s))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares SHA-256 digests over every byte, so the time taken does not
    /// depend on where the keys differ or how long either one is.
    pub fn matches(&self, presented: &str) -> bool {
        let ours = Sha256::digest(self.0.as_bytes());
        let theirs = Sha256::digest(presented.as_bytes());
        let diff = ours
            .iter()
            .zip(theirs.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        std::hint::black_box(diff) == 0
    }
}

// Never print the secret.
impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "AuthKey(<none>)")
        } else {
            write!(f, "AuthKey(<redacted>)")
        }
    }
}

impl TryFrom<String> for AuthKey {
    type Error = CoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        AuthKey::parse(s)
    }
}

impl From<AuthKey> for String {
    fn from(k: AuthKey) -> String {
        k.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMetadata {
    pub auth_key: Lww<AuthKey>,
}

impl AuthMetadata {
    pub fn new(auth_key: Lww<AuthKey>) -> Self {
        Self { auth_key }
    }
}

impl Crdt for AuthMetadata {
    fn join(&self, other: &Self) -> Self {
        Self {
            auth_key: self.auth_key.join(&other.auth_key),
        }
    }
}

impl Versioned for AuthMetadata {
    const KIND: &'static str = "auth";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_13;
}
