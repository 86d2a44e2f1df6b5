//! Snapshot files.
//!
//! Three formats, picked by file extension:
//! - `.json`: pretty JSON
//! - `.gz`: gzip-compressed JSON
//! - anything else: binary, `TLAT` magic + SHA-256 of the payload + rkyv payload

use anyhow::Result as AnyResult;
use rkyv::de::deserializers::SharedDeserializeMap;
use rkyv::ser::serializers::AllocSerializer;
use rkyv::ser::Serializer;
use rkyv::{AlignedVec, Archive, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use trilattice_core::snapshot::WorldSnapshot;

use crate::error::{IoError, Result};
use crate::serialization::{read_json_file, read_json_gz, write_json_file, write_json_gz};

const MAGIC: &[u8; 4] = b"TLAT";
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + DIGEST_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    GzipJson,
    Binary,
}

impl SnapshotFormat {
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("json") => SnapshotFormat::Json,
            Some("gz") => SnapshotFormat::GzipJson,
            _ => SnapshotFormat::Binary,
        }
    }
}

/// Hex SHA-256 of a byte slice.
#[must_use]
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn to_rkyv_bytes<T>(data: &T) -> AnyResult<AlignedVec>
where
    T: Serialize<AllocSerializer<4096>>,
{
    let mut serializer = AllocSerializer::<4096>::default();
    serializer
        .serialize_value(data)
        .map_err(|e| anyhow::anyhow!("Rkyv serialization error: {:?}", e))?;
    Ok(serializer.into_serializer().into_inner())
}

pub fn from_rkyv_bytes<T>(bytes: &[u8]) -> AnyResult<T>
where
    T: Archive,
    T::Archived: Deserialize<T, SharedDeserializeMap>
        + for<'a> rkyv::CheckBytes<rkyv::validation::validators::DefaultValidator<'a>>,
{
    let mut aligned = AlignedVec::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    let archived = rkyv::check_archived_root::<T>(&aligned)
        .map_err(|e| anyhow::anyhow!("Rkyv validation error: {:?}", e))?;
    let mut deserializer = SharedDeserializeMap::default();
    let deserialized: T = archived
        .deserialize(&mut deserializer)
        .map_err(|e| anyhow::anyhow!("Rkyv deserialization error: {:?}", e))?;
    Ok(deserialized)
}

pub fn save_rkyv<T, P>(data: &T, path: P) -> AnyResult<()>
where
    T: Serialize<AllocSerializer<4096>>,
    P: AsRef<Path>,
{
    let bytes = to_rkyv_bytes(data)?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

pub fn load_rkyv<T, P>(path: P) -> AnyResult<T>
where
    T: Archive,
    T::Archived: Deserialize<T, SharedDeserializeMap>
        + for<'a> rkyv::CheckBytes<rkyv::validation::validators::DefaultValidator<'a>>,
    P: AsRef<Path>,
{
    let bytes = std::fs::read(path)?;
    from_rkyv_bytes(&bytes)
}

/// Binary snapshot: header plus rkyv payload.
pub fn encode_binary(snapshot: &WorldSnapshot) -> Result<Vec<u8>> {
    let payload = to_rkyv_bytes(snapshot).map_err(|e| IoError::rkyv(e.to_string()))?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&Sha256::digest(&payload));
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Inverse of [`encode_binary`]; rejects a wrong magic or a digest mismatch
/// before touching the payload.
pub fn decode_binary(bytes: &[u8]) -> Result<WorldSnapshot> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(IoError::validation("not a trilattice snapshot"));
    }
    let expected = &bytes[MAGIC.len()..HEADER_LEN];
    let payload = &bytes[HEADER_LEN..];
    let actual = Sha256::digest(payload);
    if actual.as_slice() != expected {
        return Err(IoError::validation(format!(
            "snapshot digest mismatch: header {}, payload {}",
            hex::encode(expected),
            hex::encode(actual)
        )));
    }
    from_rkyv_bytes(payload).map_err(|e| IoError::rkyv(e.to_string()))
}

/// Writes a snapshot in the format implied by the extension.
pub fn save_snapshot<P: AsRef<Path>>(snapshot: &WorldSnapshot, path: P) -> Result<()> {
    let path = path.as_ref();
    let format = SnapshotFormat::from_path(path);
    match format {
        SnapshotFormat::Json => write_json_file(snapshot, path)?,
        SnapshotFormat::GzipJson => write_json_gz(snapshot, path)?,
        SnapshotFormat::Binary => {
            let bytes = encode_binary(snapshot)?;
            std::fs::write(path, bytes)
                .map_err(|e| IoError::FileSystem(e).with_context(format!("writing {:?}", path)))?;
        }
    }
    tracing::info!(path = %path.display(), ?format, tick = snapshot.tick, "Snapshot saved");
    Ok(())
}

/// Reads a snapshot and runs its structural validation.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<WorldSnapshot> {
    let path = path.as_ref();
    let snapshot = match SnapshotFormat::from_path(path) {
        SnapshotFormat::Json => read_json_file(path)?,
        SnapshotFormat::GzipJson => read_json_gz(path)?,
        SnapshotFormat::Binary => {
            let bytes = std::fs::read(path)
                .map_err(|e| IoError::FileSystem(e).with_context(format!("reading {:?}", path)))?;
            decode_binary(&bytes).map_err(|e| e.with_context(format!("decoding {:?}", path)))?
        }
    };
    snapshot.validate()?;
    Ok(snapshot)
}
