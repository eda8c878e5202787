//! Protocol versions and the versioned envelope.
//!
//! ClusterVersion: the cluster protocol generation a value was written at
//! Versioned: per-type kind tag and oldest writable version
//! Envelope: CBOR `{v, kind, body}` with a JSON body

use std::fmt;

use minicbor::data::Type;
use minicbor::{Decoder, Encoder};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::{DecodeError, EncodeError};
use super::limits::Limits;

/// Cluster protocol generation.
///
/// Metadata written before `V1_13` is refused rather than migrated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClusterVersion {
    V1_13,
    V1_14,
    V1_15,
}

impl ClusterVersion {
    pub const LATEST: ClusterVersion = ClusterVersion::V1_15;
    pub const OLDEST: ClusterVersion = ClusterVersion::V1_13;

    pub fn tag(self) -> u32 {
        match self {
            ClusterVersion::V1_13 => 13,
            ClusterVersion::V1_14 => 14,
            ClusterVersion::V1_15 => 15,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            13 => Some(ClusterVersion::V1_13),
            14 => Some(ClusterVersion::V1_14),
            15 => Some(ClusterVersion::V1_15),
            _ => None,
        }
    }
}

impl fmt::Display for ClusterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v1_{}", self.tag())
    }
}

/// A metadata type that can be written into a versioned envelope.
pub trait Versioned {
    const KIND: &'static str;
    /// Oldest protocol version this type can be written at or read from.
    const MIN_VERSION: ClusterVersion;
}

/// Decoded envelope with its body still encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub version: u32,
    pub kind: String,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::with_capacity(self.body.len() + 32);
        let mut enc = Encoder::new(&mut buf);
        enc.map(3)?;
        enc.str("v")?;
        enc.u32(self.version)?;
        enc.str("kind")?;
        enc.str(&self.kind)?;
        enc.str("body")?;
        enc.bytes(&self.body)?;
        Ok(buf)
    }

    pub fn decode(bytes: &[u8], limits: &Limits) -> Result<Self, DecodeError> {
        if bytes.len() > limits.max_metadata_bytes {
            return Err(DecodeError::DecodeLimit("max_metadata_bytes"));
        }
        let mut dec = Decoder::new(bytes);
        let Some(map_len) = dec.map()? else {
            return Err(DecodeError::IndefiniteLength);
        };
        if map_len > limits.max_cbor_map_entries as u64 {
            return Err(DecodeError::DecodeLimit("max_cbor_map_entries"));
        }

        let mut version = None;
        let mut kind = None;
        let mut body = None;
        for _ in 0..map_len {
            let key = decode_text(&mut dec, limits)?;
            match key {
                "v" => {
                    let raw = dec.u64()?;
                    let tag = u32::try_from(raw).map_err(|_| DecodeError::UnknownVersion(u32::MAX))?;
                    version = Some(tag);
                }
                "kind" => kind = Some(decode_text(&mut dec, limits)?.to_string()),
                "body" => {
                    if matches!(dec.datatype()?, Type::BytesIndef) {
                        return Err(DecodeError::IndefiniteLength);
                    }
                    body = Some(dec.bytes()?.to_vec());
                }
                _ => dec.skip()?,
            }
        }

        if dec.datatype().is_ok() {
            return Err(DecodeError::TrailingBytes);
        }

        Ok(Self {
            version: version.ok_or(DecodeError::MissingField("v"))?,
            kind: kind.ok_or(DecodeError::MissingField("kind"))?,
            body: body.ok_or(DecodeError::MissingField("body"))?,
        })
    }
}

fn decode_text<'a>(dec: &mut Decoder<'a>, limits: &Limits) -> Result<&'a str, DecodeError> {
    if matches!(dec.datatype()?, Type::StringIndef) {
        return Err(DecodeError::IndefiniteLength);
    }
    let s = dec.str()?;
    if s.len() > limits.max_cbor_text_string_len {
        return Err(DecodeError::DecodeLimit("max_cbor_text_string_len"));
    }
    Ok(s)
}

/// Write `value` tagged with `version`.
///
/// Refuses versions older than the type's `MIN_VERSION`.
pub fn serialize_versioned<T>(value: &T, version: ClusterVersion) -> Result<Vec<u8>, EncodeError>
where
    T: Versioned + Serialize,
{
    if version < T::MIN_VERSION {
        return Err(EncodeError::UnsupportedVersion {
            kind: T::KIND,
            requested: version,
            min: T::MIN_VERSION,
        });
    }
    Envelope {
        version: version.tag(),
        kind: T::KIND.to_string(),
        body: serde_json::to_vec(value)?,
    }
    .encode()
}

/// Read a value written by [`serialize_versioned`].
///
/// Tags below the type's `MIN_VERSION` fail with `UnsupportedVersion`; tags
/// newer than [`ClusterVersion::LATEST`] fail with `UnknownVersion`.
pub fn deserialize_versioned<T>(bytes: &[u8], limits: &Limits) -> Result<T, DecodeError>
where
    T: Versioned + DeserializeOwned,
{
    let envelope = Envelope::decode(bytes, limits)?;
    if envelope.kind != T::KIND {
        return Err(DecodeError::WrongKind {
            expected: T::KIND,
            found: envelope.kind,
        });
    }
    check_version::<T>(envelope.version)?;
    Ok(serde_json::from_slice(&envelope.body)?)
}

fn check_version<T: Versioned>(tag: u32) -> Result<ClusterVersion, DecodeError> {
    if tag < T::MIN_VERSION.tag() {
        return Err(DecodeError::UnsupportedVersion {
            kind: T::KIND,
            found: tag,
            min: T::MIN_VERSION,
        });
    }
    ClusterVersion::from_tag(tag).ok_or(DecodeError::UnknownVersion(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crdt::Lww;
    use crate::core::database::{DatabaseMetadata, DatabasesMetadata};
    use crate::core::deletable::Deletable;
    use crate::core::identity::{DatabaseId, NameString, PeerId};
    use crate::core::machine::MachinesMetadata;
    use crate::core::time::{Stamp, WriteStamp};

    fn databases() -> DatabasesMetadata {
        let mut dbs = DatabasesMetadata::new();
        dbs.upsert(
            DatabaseId::generate(),
            Deletable::Live(DatabaseMetadata::new(Lww::new(
                NameString::parse("test").unwrap(),
                Stamp::new(WriteStamp::new(1, 0), PeerId::generate()),
            ))),
        );
        dbs.tombstone(DatabaseId::generate());
        dbs
    }

    #[test]
    fn roundtrip_at_every_supported_version() {
        let dbs = databases();
        for version in [ClusterVersion::V1_13, ClusterVersion::V1_14, ClusterVersion::V1_15] {
            let bytes = serialize_versioned(&dbs, version).unwrap();
            let back: DatabasesMetadata = deserialize_versioned(&bytes, &Limits::default()).unwrap();
            assert_eq!(back, dbs);
        }
    }

    #[test]
    fn refuses_to_write_below_min_version() {
        let err = serialize_versioned(&MachinesMetadata::new(), ClusterVersion::V1_14).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedVersion { kind: "machines", .. }));
    }

    #[test]
    fn rejects_old_and_future_tags() {
        let body = serde_json::to_vec(&MachinesMetadata::new()).unwrap();
        let old = Envelope {
            version: ClusterVersion::V1_13.tag(),
            kind: "machines".into(),
            body: body.clone(),
        }
        .encode()
        .unwrap();
        let err = deserialize_versioned::<MachinesMetadata>(&old, &Limits::default()).unwrap_err();
        assert!(err.is_unsupported_version());

        let pre_release = Envelope {
            version: 1,
            kind: "databases".into(),
            body: b"{}".to_vec(),
        }
        .encode()
        .unwrap();
        let err =
            deserialize_versioned::<DatabasesMetadata>(&pre_release, &Limits::default()).unwrap_err();
        assert!(err.is_unsupported_version());

        let future = Envelope {
            version: 99,
            kind: "machines".into(),
            body,
        }
        .encode()
        .unwrap();
        let err = deserialize_versioned::<MachinesMetadata>(&future, &Limits::default()).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownVersion(99)));
    }

    #[test]
    fn rejects_wrong_kind_and_trailing_bytes() {
        let mut bytes = serialize_versioned(&databases(), ClusterVersion::LATEST).unwrap();
        let err = deserialize_versioned::<MachinesMetadata>(&bytes, &Limits::default()).unwrap_err();
        assert!(matches!(err, DecodeError::WrongKind { expected: "machines", .. }));

        bytes.push(0x00);
        let err = deserialize_versioned::<DatabasesMetadata>(&bytes, &Limits::default()).unwrap_err();
        assert!(matches!(err, DecodeError::TrailingBytes));
    }

    #[test]
    fn enforces_size_limit() {
        let bytes = serialize_versioned(&databases(), ClusterVersion::LATEST).unwrap();
        let limits = Limits {
            max_metadata_bytes: 8,
            ..Limits::default()
        };
        let err = deserialize_versioned::<DatabasesMetadata>(&bytes, &limits).unwrap_err();
        assert!(matches!(err, DecodeError::DecodeLimit("max_metadata_bytes")));
    }
}
