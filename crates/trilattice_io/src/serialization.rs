//! Serialization utilities with robust error handling.
//!
//! JSON in plain and gzip-compressed form. Binary snapshots live in
//! [`crate::persistence`].

use crate::error::{IoError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Serializes data to compact JSON.
pub fn to_json<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string(data)
        .map_err(|e| IoError::serialization(format!("JSON serialization failed: {}", e)))
}

pub fn to_json_pretty<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string_pretty(data)
        .map_err(|e| IoError::serialization(format!("JSON serialization failed: {}", e)))
}

/// Deserializes data from a JSON string. Empty input is a validation error.
pub fn from_json<T>(json: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if json.trim().is_empty() {
        return Err(IoError::validation("Empty JSON string"));
    }

    serde_json::from_str(json)
        .map_err(|e| IoError::serialization(format!("JSON deserialization failed: {}", e)))
}

/// Checks that a JSON string deserializes into `T`.
pub fn validate_json<T>(json: &str) -> Result<()>
where
    T: for<'de> Deserialize<'de>,
{
    let _: T = from_json(json)?;
    Ok(())
}

/// Writes pretty-printed JSON to a file.
pub fn write_json_file<T, P>(data: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let json = to_json_pretty(data)?;
    std::fs::write(&path, json).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("writing JSON to {:?}", path.as_ref()))
    })?;
    Ok(())
}

pub fn read_json_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let json = std::fs::read_to_string(&path).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("reading JSON from {:?}", path.as_ref()))
    })?;
    from_json(&json)
}

/// Writes compact JSON through a gzip encoder.
pub fn write_json_gz<T, P>(data: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let file = File::create(&path).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("creating {:?}", path.as_ref()))
    })?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, data)?;
    let mut inner = encoder
        .finish()
        .map_err(|e| IoError::compression(format!("gzip finish failed: {}", e)))?;
    inner.flush()?;
    Ok(())
}

pub fn read_json_gz<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let file = File::open(&path).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("opening {:?}", path.as_ref()))
    })?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut json = String::new();
    decoder
        .read_to_string(&mut json)
        .map_err(|e| IoError::compression(format!("gzip decode failed: {}", e)))?;
    from_json(&json)
}
