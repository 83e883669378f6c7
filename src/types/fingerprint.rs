use std::fmt;

use crate::errors::{bail, ensure_eq, Result};
use crate::types::KeyId;

/// A version 4 key fingerprint: the SHA1 hash of the public key material.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 20]);

impl Fingerprint {
    pub fn new(data: [u8; 20]) -> Self {
        Fingerprint(data)
    }

    pub fn from_slice(input: &[u8]) -> Result<Self> {
        ensure_eq!(input.len(), 20, "invalid fingerprint length");

        let mut fp = [0u8; 20];
        fp.copy_from_slice(input);
        Ok(Fingerprint(fp))
    }

    /// The key id is the low 64 bits of the fingerprint.
    pub fn key_id(&self) -> KeyId {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[12..]);
        KeyId::from(id)
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(self.0))
    }
}
