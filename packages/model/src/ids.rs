use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique id of a document entity. Stable across clones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Uid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Generate a document tag from its name using CRC32
pub fn get_document_id(name: &str) -> String {
    let mut buff = String::from(name);
    if !name.starts_with("doc://") {
        buff = format!("doc://{}", buff);
    }

    let mut hasher = Hasher::new();
    hasher.update(buff.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// CRC32 over a list of parts. Parts are separated so that
/// `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn hash_parts<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part.as_ref().as_bytes());
        hasher.update(&[0x1f]);
    }
    format!("{:08x}", hasher.finalize())
}

/// Sequential id generator for entities created during a merge
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u32,
}

impl IdGenerator {
    pub fn new(document_name: &str) -> Self {
        Self {
            seed: get_document_id(document_name),
            count: 0,
        }
    }

    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: 0,
        }
    }

    /// Generate next sequential id
    pub fn new_id(&mut self) -> Uid {
        self.count += 1;
        Uid(format!("{}-{}", self.seed, self.count))
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_generation() {
        let id1 = get_document_id("site");
        let id2 = get_document_id("site");
        assert_eq!(id1, id2);
        assert_ne!(id1, get_document_id("other"));
    }

    #[test]
    fn test_sequential_ids() {
        let mut gen = IdGenerator::from_seed("merged");
        assert_eq!(gen.new_id().as_str(), "merged-1");
        assert_eq!(gen.new_id().as_str(), "merged-2");
        assert_eq!(gen.seed(), "merged");
    }

    #[test]
    fn test_hash_parts_separates_boundaries() {
        assert_eq!(hash_parts(&["a", "b"]), hash_parts(&["a", "b"]));
        assert_ne!(hash_parts(&["ab", "c"]), hash_parts(&["a", "bc"]));
    }

    #[test]
    fn test_uid_serializes_as_plain_string() {
        let uid = Uid::new("n1");
        assert_eq!(serde_json::to_string(&uid).unwrap(), "\"n1\"");
    }
}
