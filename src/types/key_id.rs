use std::fmt;
use std::io;

use bytes::Buf;

use crate::errors::{bail, ensure_eq, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;

/// The 8 octet key identifier, the low 64 bits of the fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; 8]);

impl KeyId {
    /// The wildcard id, used to address "any key".
    pub const WILDCARD: KeyId = KeyId([0u8; 8]);

    pub fn from_slice(input: &[u8]) -> Result<Self> {
        ensure_eq!(input.len(), 8, "invalid key id length");

        let mut id = [0u8; 8];
        id.copy_from_slice(input);
        Ok(KeyId(id))
    }

    pub fn from_buf<B: Buf>(i: &mut B) -> Result<Self> {
        Ok(KeyId(i.read_array::<8>()?))
    }

    pub fn is_wildcard(&self) -> bool {
        *self == Self::WILDCARD
    }
}

impl From<[u8; 8]> for KeyId {
    fn from(id: [u8; 8]) -> Self {
        KeyId(id)
    }
}

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for KeyId {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.0)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        8
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", hex::encode(self.0))
    }
}
