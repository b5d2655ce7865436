//! Content hashes and the canonical hasher
//!
//! A [`Hash`] is an opaque byte string: it identifies objects in the
//! metadata store and doubles as the persistence key. The wire form is
//! lowercase hex; the empty hash renders as the empty string. Hashes are
//! produced by MD5 over canonical object encodings (see the constructors in
//! `objects`).

use crate::error::{Error, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque content hash, scoped per repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(Vec<u8>);

impl Hash {
    /// The empty hash: identity of the empty tree, and the value of a
    /// branch that has no commits yet.
    pub fn empty() -> Self {
        Hash(Vec::new())
    }

    pub fn new(bytes: Vec<u8>) -> Self {
        Hash(bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex form; empty hash renders as `""`.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex. The empty string parses to the empty hash.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Hash::empty());
        }
        let bytes = hex::decode(s).map_err(|_| Error::Invalid(format!("hex hash: {s}")))?;
        Ok(Hash(bytes))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(D::Error::custom)
    }
}

/// MD5 accumulator for canonical object encodings.
///
/// Writers append raw bytes with no framing; determinism comes from the
/// canonical field order each object constructor follows.
pub struct Hasher {
    ctx: md5::Context,
}

impl Hasher {
    pub fn new() -> Self {
        Hasher {
            ctx: md5::Context::new(),
        }
    }

    pub fn write_i8(&mut self, value: i8) {
        self.ctx.consume([value as u8]);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.ctx.consume(value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.ctx.consume(bytes);
    }

    pub fn write_string(&mut self, s: &str) {
        self.ctx.consume(s.as_bytes());
    }

    pub fn finalize(self) -> Hash {
        let digest = self.ctx.compute();
        Hash(digest.0.to_vec())
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}
