//! Content-hash-keyed cache for parser/analyzer outputs (§4.2).
//!
//! Keys are `sha256(file_bytes)` combined with the caller's parser schema
//! version, so bumping a parser's schema version invalidates its whole slice
//! of the cache without touching anything else. Values are opaque to this
//! crate — callers serialize whatever their stage produces; this crate only
//! owns the envelope, the key derivation, and the directory layout.

use ca_common::hashing::sha256_hex;
use ca_common::stdfs;
use ca_error::AnalysisResult;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// `.applycrypto/cache/<schema_version>/<sha256>.bin` (§6).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    schema_version: u32,
    content_hash: String,
}

impl CacheKey {
    pub fn new(file_bytes: &[u8], schema_version: u32) -> Self {
        CacheKey {
            schema_version,
            content_hash: sha256_hex(file_bytes),
        }
    }

    fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.schema_version.to_string()).join(format!("{}.bin", self.content_hash))
    }
}

/// The on-disk envelope. `produced_at` is deliberately not part of the
/// serialized payload hashed for lookup purposes — cache hits must be purely
/// a function of content + schema version (Testable Property 2), so nothing
/// time-derived can leak into the key or be compared.
#[derive(Debug, serde::Deserialize)]
struct Envelope<T> {
    schema_version: u32,
    payload: T,
}

#[derive(Debug, serde::Serialize)]
struct EnvelopeRef<'a, T> {
    schema_version: u32,
    payload: &'a T,
}

pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CacheStore { root: root.into() }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> AnalysisResult<Option<T>> {
        let path = self.root.join(key.relative_path());
        if !path.exists() {
            return Ok(None);
        }
        let bytes = stdfs::read(&path)?;
        match serde_json::from_slice::<Envelope<T>>(&bytes) {
            Ok(envelope) if envelope.schema_version == key.schema_version => {
                Ok(Some(envelope.payload))
            }
            // A schema-version mismatch on a key that otherwise exists means
            // a stale entry survived a directory that wasn't fully cleaned;
            // treat it as a miss rather than erroring the whole run.
            _ => Ok(None),
        }
    }

    pub fn put<T: Serialize>(&self, key: &CacheKey, value: &T) -> AnalysisResult<()> {
        let path = self.root.join(key.relative_path());
        let envelope = EnvelopeRef {
            schema_version: key.schema_version,
            payload: value,
        };
        let bytes = serde_json::to_vec(&envelope).map_err(|source| ca_error::AnalysisError::Parse {
            file: path.clone(),
            reason: source.to_string(),
        })?;
        stdfs::write_atomic(&path, &bytes)
    }

    pub fn invalidate(&self, key: &CacheKey) -> AnalysisResult<()> {
        let path = self.root.join(key.relative_path());
        if path.exists() {
            std::fs::remove_file(&path).map_err(|source| ca_error::AnalysisError::Io {
                path,
                source,
            })?;
        }
        Ok(())
    }

    /// Drops the whole cache, e.g. when the CLI's `clean` subcommand runs.
    pub fn clear(&self) -> AnalysisResult<()> {
        stdfs::remove_dir_all(&self.root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
