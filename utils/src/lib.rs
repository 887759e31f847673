#![doc = include_str!("../Readme.md")]

use std::collections::HashMap;
use std::mem::size_of;

use bytes::{Buf, BytesMut};

/// Forward to [`tracing::debug!`] when the calling crate enables its
/// `tracing` feature, compile to nothing otherwise.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        ::tracing::debug!($($arg)*);
    }};
}

/// Safe extensions to methods from [`bytes::BytesMut`].
pub trait ByteParsing {
    /// Split at the given delimiter.
    ///
    /// Returns the bytes before the delimiter; the delimiter itself is
    /// consumed. `None` if the delimiter does not occur.
    fn delimited(&mut self, delimiter: u8) -> Option<BytesMut>;

    /// Bounds checked variant of [`bytes::BytesMut::split_to`]
    fn safe_split_to(&mut self, at: usize) -> Option<BytesMut>;

    /// Bounds checked variant of [`bytes::Buf::get_u8`]
    fn safe_get_u8(&mut self) -> Option<u8>;

    /// Bounds checked variant of [`bytes::Buf::get_u16`]
    fn safe_get_u16(&mut self) -> Option<u16>;

    /// Bounds checked variant of [`bytes::Buf::get_u32`]
    fn safe_get_u32(&mut self) -> Option<u32>;
}

impl ByteParsing for BytesMut {
    fn delimited(&mut self, delimiter: u8) -> Option<BytesMut> {
        let index = self.iter().position(|&b| b == delimiter)?;

        let off = self.split_to(index);
        self.advance(1);

        Some(off)
    }

    fn safe_split_to(&mut self, at: usize) -> Option<Self> {
        if at > self.len() {
            return None;
        }
        Some(self.split_to(at))
    }

    fn safe_get_u8(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        Some(self.get_u8())
    }

    fn safe_get_u16(&mut self) -> Option<u16> {
        if self.len() < size_of::<u16>() {
            return None;
        }
        Some(self.get_u16())
    }

    fn safe_get_u32(&mut self) -> Option<u32> {
        if self.len() < size_of::<u32>() {
            return None;
        }
        Some(self.get_u32())
    }
}

/// A string map with ASCII-case-insensitive keys.
///
/// Keys are stored folded to lowercase; lookups fold before hashing, so
/// `{DAEMON_NAME}` and `{daemon_name}` address the same entry.
#[derive(Debug, Clone)]
pub struct CaseFoldMap<V> {
    inner: HashMap<String, V>,
}

impl<V> Default for CaseFoldMap<V> {
    fn default() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }
}

impl<V> CaseFoldMap<V> {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key`, replacing (and returning) any value
    /// stored under a case-variant of the same key.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        self.inner.insert(key.to_ascii_lowercase(), value)
    }

    /// Look up `key`, ignoring ASCII case
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.inner.get(&key.to_ascii_lowercase())
    }

    /// Drop all entries, keeping the allocation
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Whether the map holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}
