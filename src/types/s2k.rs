use std::io;

use bytes::Buf;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{bail, unsupported_err, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;

const EXPBIAS: u32 = 6;

/// Default coded iteration count (decodes to 16 MiB of hashed input).
const DEFAULT_CODED_COUNT: u8 = 0xE0;

/// String-to-Key specifier, deriving a symmetric key from a passphrase.
///
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-3.7>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringToKey {
    pub typ: StringToKeyType,
    pub hash: HashAlgorithm,
    pub salt: Option<[u8; 8]>,
    pub count: Option<u8>,
}

/// Available String-To-Key types
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum StringToKeyType {
    Simple = 0,
    Salted = 1,
    IteratedAndSalted = 3,
}

impl StringToKeyType {
    fn from_u8(typ: u8) -> Option<Self> {
        match typ {
            0 => Some(StringToKeyType::Simple),
            1 => Some(StringToKeyType::Salted),
            3 => Some(StringToKeyType::IteratedAndSalted),
            _ => None,
        }
    }

    fn has_salt(self) -> bool {
        matches!(
            self,
            StringToKeyType::Salted | StringToKeyType::IteratedAndSalted
        )
    }

    fn has_count(self) -> bool {
        matches!(self, StringToKeyType::IteratedAndSalted)
    }
}

impl StringToKey {
    /// Iterated and salted S2K with the default hash and count.
    pub fn new_iterated<R: Rng + CryptoRng>(rng: &mut R) -> Self {
        let mut salt = [0u8; 8];
        rng.fill_bytes(&mut salt);

        StringToKey {
            typ: StringToKeyType::IteratedAndSalted,
            hash: HashAlgorithm::Sha256,
            salt: Some(salt),
            count: Some(DEFAULT_CODED_COUNT),
        }
    }

    /// Converts a coded count into the count.
    /// Ref: <https://tools.ietf.org/html/rfc4880#section-3.7.1.3>
    pub fn count(&self) -> Option<usize> {
        self.count
            .map(|c| ((16u32 + u32::from(c & 15)) << (u32::from(c >> 4) + EXPBIAS)) as usize)
    }

    pub fn from_buf<B: Buf>(i: &mut B) -> Result<Self> {
        let typ = i.read_u8()?;
        let Some(typ) = StringToKeyType::from_u8(typ) else {
            unsupported_err!("string to key type {}", typ);
        };
        let hash = HashAlgorithm::from(i.read_u8()?);

        let salt = if typ.has_salt() {
            Some(i.read_array::<8>()?)
        } else {
            None
        };
        let count = if typ.has_count() {
            Some(i.read_u8()?)
        } else {
            None
        };

        Ok(StringToKey {
            typ,
            hash,
            salt,
            count,
        })
    }

    /// Derive `key_size` bytes of key material from `passphrase`.
    ///
    /// When the digest is shorter than the requested key, additional hash
    /// contexts preloaded with zero octets are run over the same input.
    /// Ref: <https://tools.ietf.org/html/rfc4880#section-3.7.1>
    pub fn derive_key(&self, passphrase: &[u8], key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        let Some(digest_size) = self.hash.digest_size() else {
            unsupported_err!("s2k hash algorithm {:?}", self.hash);
        };

        let mut source = Vec::with_capacity(8 + passphrase.len());
        if let Some(salt) = &self.salt {
            source.extend_from_slice(salt);
        }
        source.extend_from_slice(passphrase);
        let source = Zeroizing::new(source);

        if source.is_empty() {
            bail!("empty s2k input");
        }

        // total number of octets fed into each hash context
        let total = match self.typ {
            StringToKeyType::Simple | StringToKeyType::Salted => source.len(),
            StringToKeyType::IteratedAndSalted => {
                // a missing count degrades to hashing the input once
                self.count().unwrap_or_default().max(source.len())
            }
        };

        let rounds = key_size.div_ceil(digest_size);
        let mut key = Zeroizing::new(Vec::with_capacity(rounds * digest_size));

        for round in 0..rounds {
            let mut hasher = self.hash.new_hasher()?;
            // preload with `round` zero octets
            for _ in 0..round {
                hasher.update(&[0u8]);
            }

            let mut remaining = total;
            while remaining > 0 {
                let n = remaining.min(source.len());
                hasher.update(&source[..n]);
                remaining -= n;
            }

            key.extend_from_slice(&hasher.finalize());
        }

        key.truncate(key_size);
        Ok(key)
    }
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.typ as u8, self.hash.into()])?;

        if let Some(ref salt) = self.salt {
            writer.write_all(salt)?;
        }

        if let Some(count) = self.count {
            writer.write_all(&[count])?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut len = 2;
        if self.salt.is_some() {
            len += 8;
        }
        if self.count.is_some() {
            len += 1;
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_count() {
        let s2k = StringToKey {
            typ: StringToKeyType::IteratedAndSalted,
            hash: HashAlgorithm::Sha256,
            salt: Some([0u8; 8]),
            count: Some(0x60),
        };
        assert_eq!(s2k.count(), Some(65536));

        let s2k = StringToKey {
            count: Some(0xE0),
            ..s2k
        };
        assert_eq!(s2k.count(), Some(16 << 20));
    }

    #[test]
    fn serialize_roundtrip() {
        let s2k = StringToKey {
            typ: StringToKeyType::IteratedAndSalted,
            hash: HashAlgorithm::Sha256,
            salt: Some(*b"saltsalt"),
            count: Some(0x60),
        };
        let buf = s2k.to_bytes().unwrap();
        assert_eq!(buf.len(), s2k.write_len());
        assert_eq!(StringToKey::from_buf(&mut &buf[..]).unwrap(), s2k);
    }

    #[test]
    fn derive_is_deterministic_and_salted() {
        let s2k = StringToKey {
            typ: StringToKeyType::IteratedAndSalted,
            hash: HashAlgorithm::Sha256,
            salt: Some(*b"01234567"),
            count: Some(0x60),
        };

        let a = s2k.derive_key(b"secret", 16).unwrap();
        let b = s2k.derive_key(b"secret", 16).unwrap();
        assert_eq!(a, b);

        let other_salt = StringToKey {
            salt: Some(*b"76543210"),
            ..s2k.clone()
        };
        assert_ne!(a, other_salt.derive_key(b"secret", 16).unwrap());

        // keys longer than the digest use the zero-preload construction
        let long = s2k.derive_key(b"secret", 48).unwrap();
        assert_eq!(long.len(), 48);
        assert_eq!(&long[..16], &a[..]);
    }

    #[test]
    fn simple_s2k_matches_plain_hash() {
        let s2k = StringToKey {
            typ: StringToKeyType::Simple,
            hash: HashAlgorithm::Sha256,
            salt: None,
            count: None,
        };
        let key = s2k.derive_key(b"passphrase", 32).unwrap();
        let digest = HashAlgorithm::Sha256.digest(b"passphrase").unwrap();
        assert_eq!(&key[..], &digest[..]);
    }
}
