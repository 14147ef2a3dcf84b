//! Durable-store keys, their canonical cache-key encoding, and scan cursors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CodecError;

/// Separator between path segments in the canonical key form.
const SEGMENT_SEPARATOR: char = '/';

/// The identifying part of a single key segment.
///
/// Integer ids order before string names, and each variant orders naturally
/// within itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyId {
    /// Numeric identifier.
    Int(i64),
    /// String identifier.
    Name(String),
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Int(id) => write!(f, "{}", id),
            KeyId::Name(name) => write!(f, "{:?}", name),
        }
    }
}

impl From<i64> for KeyId {
    fn from(id: i64) -> Self {
        KeyId::Int(id)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        KeyId::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        KeyId::Name(name)
    }
}

/// Opaque durable-store identifier.
///
/// A key is a kind tag plus an id, optionally nested under a parent key.
/// Keys are totally ordered (kind, then id, then parent) so stores can use
/// them as a tie-breaker when walking an index.
///
/// [`Key::encode`] produces the canonical string form used as the cache key.
/// The encoding is injective: two distinct keys never share an encoding, and
/// [`Key::decode`] recovers the original key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    kind: String,
    id: KeyId,
    parent: Option<Box<Key>>,
}

impl Key {
    /// Create a root key.
    pub fn new(kind: impl Into<String>, id: impl Into<KeyId>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            parent: None,
        }
    }

    /// Create a root key with a string id.
    pub fn named(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(kind, KeyId::Name(name.into()))
    }

    /// Create a root key with a numeric id.
    pub fn int(kind: impl Into<String>, id: i64) -> Self {
        Self::new(kind, KeyId::Int(id))
    }

    /// Nest this key under `parent`.
    pub fn with_parent(mut self, parent: Key) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// The kind tag of this key.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The id of this key.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// The parent key, if any.
    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// Returns true if `ancestor` is this key or one of its parents.
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        let mut current = Some(self);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = key.parent();
        }
        false
    }

    /// Segments from the root down to this key.
    fn path(&self) -> Vec<&Key> {
        let mut path = Vec::new();
        let mut current = Some(self);
        while let Some(key) = current {
            path.push(key);
            current = key.parent();
        }
        path.reverse();
        path
    }

    /// Canonical, length-prefixed textual form.
    ///
    /// Each segment is `<kind-len>:<kind>` followed by `i<int>` or
    /// `n<name-len>:<name>`. Length prefixes make the form unambiguous for
    /// arbitrary kind and name contents.
    fn canonical(&self) -> String {
        let mut out = String::new();
        for (i, key) in self.path().into_iter().enumerate() {
            if i > 0 {
                out.push(SEGMENT_SEPARATOR);
            }
            out.push_str(&format!("{}:{}", key.kind.len(), key.kind));
            match &key.id {
                KeyId::Int(id) => out.push_str(&format!("i{}", id)),
                KeyId::Name(name) => out.push_str(&format!("n{}:{}", name.len(), name)),
            }
        }
        out
    }

    /// Encode this key to its cache-key string.
    pub fn encode(&self) -> String {
        hex::encode(self.canonical())
    }

    /// Decode a key previously produced by [`Key::encode`].
    pub fn decode(encoded: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(encoded).map_err(|e| CodecError::InvalidKey {
            reason: e.to_string(),
        })?;
        let text = String::from_utf8(bytes).map_err(|e| CodecError::InvalidKey {
            reason: e.to_string(),
        })?;

        let mut parser = CanonicalParser { rest: &text };
        let mut key: Option<Key> = None;
        loop {
            let kind = parser.length_prefixed()?;
            let id = match parser.take_char()? {
                'i' => {
                    let digits = parser.take_while(|c| c == '-' || c.is_ascii_digit());
                    KeyId::Int(digits.parse().map_err(|_| CodecError::InvalidKey {
                        reason: format!("invalid integer id {:?}", digits),
                    })?)
                }
                'n' => KeyId::Name(parser.length_prefixed()?.to_string()),
                other => {
                    return Err(CodecError::InvalidKey {
                        reason: format!("unexpected id marker {:?}", other),
                    })
                }
            };

            let segment = Key::new(kind, id);
            key = Some(match key {
                Some(parent) => segment.with_parent(parent),
                None => segment,
            });

            if parser.rest.is_empty() {
                break;
            }
            if parser.take_char()? != SEGMENT_SEPARATOR {
                return Err(CodecError::InvalidKey {
                    reason: "expected segment separator".to_string(),
                });
            }
        }

        key.ok_or_else(|| CodecError::InvalidKey {
            reason: "empty key".to_string(),
        })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in self.path() {
            write!(f, "/{},{}", key.kind, key.id)?;
        }
        Ok(())
    }
}

/// Cursor over the canonical key form.
struct CanonicalParser<'a> {
    rest: &'a str,
}

impl<'a> CanonicalParser<'a> {
    fn take_char(&mut self) -> Result<char, CodecError> {
        let mut chars = self.rest.chars();
        let c = chars.next().ok_or_else(|| CodecError::InvalidKey {
            reason: "unexpected end of key".to_string(),
        })?;
        self.rest = chars.as_str();
        Ok(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        taken
    }

    /// Parse `<len>:<bytes>`.
    fn length_prefixed(&mut self) -> Result<&'a str, CodecError> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        let len: usize = digits.parse().map_err(|_| CodecError::InvalidKey {
            reason: format!("invalid length prefix {:?}", digits),
        })?;
        if self.take_char()? != ':' {
            return Err(CodecError::InvalidKey {
                reason: "expected ':' after length prefix".to_string(),
            });
        }
        let value = self.rest.get(..len).ok_or_else(|| CodecError::InvalidKey {
            reason: format!("segment shorter than declared length {}", len),
        })?;
        self.rest = &self.rest[len..];
        Ok(value)
    }
}

/// Opaque continuation token produced by an index scan.
///
/// A cursor only has meaning to the store that produced it. The empty cursor
/// denotes the start of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a store-produced token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the start-of-scan cursor.
    pub fn is_start(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
