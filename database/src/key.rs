use crate::registry::DatabaseStorePrefixes;
use num_traits::FromPrimitive;
use std::fmt::{self, Debug, Display};

pub const SEP: u8 = b'/';

/// A raw rocksdb key laid out as `prefix | SEP | suffix`
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DbKey {
    bytes: Vec<u8>,
    prefix_len: usize,
}

impl DbKey {
    pub fn new(prefix: &[u8], suffix: impl AsRef<[u8]>) -> Self {
        let suffix = suffix.as_ref();
        let mut bytes = Vec::with_capacity(prefix.len() + 1 + suffix.len());
        bytes.extend_from_slice(prefix);
        bytes.push(SEP);
        bytes.extend_from_slice(suffix);
        Self { bytes, prefix_len: prefix.len() + 1 }
    }

    pub fn prefix_only(prefix: &[u8]) -> Self {
        Self::new(prefix, [0u8; 0])
    }

    /// The prefix including the trailing separator, i.e. the range shared by all keys of a store
    pub fn scope(&self) -> &[u8] {
        &self.bytes[..self.prefix_len]
    }

    pub fn suffix(&self) -> &[u8] {
        &self.bytes[self.prefix_len..]
    }
}

impl AsRef<[u8]> for DbKey {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Display for DbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = &self.bytes[..self.prefix_len - 1];
        let registered = match prefix {
            [byte] => DatabaseStorePrefixes::from_u8(*byte).map(DatabaseStorePrefixes::name),
            _ => None,
        };
        match (registered, std::str::from_utf8(prefix)) {
            (Some(name), _) => f.write_str(name)?,
            (None, Ok(s)) if !s.chars().any(char::is_control) => f.write_str(s)?,
            _ => f.write_str(&faster_hex::hex_string(prefix))?,
        }
        write!(f, "/{}", faster_hex::hex_string(self.suffix()))
    }
}

impl Debug for DbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
