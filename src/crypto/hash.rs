use std::fmt;

use digest::{Digest, DynDigest};
use md5::Md5;
use num_enum::{FromPrimitive, IntoPrimitive};
use sha1::Sha1;

use crate::errors::{unsupported_err, Result};

/// Available hash algorithms.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-9.4>
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum HashAlgorithm {
    None = 0,
    /// Weak, for legacy interoperability only.
    Md5 = 1,
    Sha1 = 2,
    Ripemd160 = 3,
    Sha256 = 8,
    Sha384 = 9,
    Sha512 = 10,
    Sha224 = 11,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::None => f.write_str("NONE"),
            HashAlgorithm::Md5 => f.write_str("MD5"),
            HashAlgorithm::Sha1 => f.write_str("SHA1"),
            HashAlgorithm::Ripemd160 => f.write_str("RIPEMD160"),
            HashAlgorithm::Sha256 => f.write_str("SHA256"),
            HashAlgorithm::Sha384 => f.write_str("SHA384"),
            HashAlgorithm::Sha512 => f.write_str("SHA512"),
            HashAlgorithm::Sha224 => f.write_str("SHA224"),
            HashAlgorithm::Other(v) => write!(f, "UNKNOWN({v})"),
        }
    }
}

impl HashAlgorithm {
    /// Create a new hasher.
    pub fn new_hasher(self) -> Result<Box<dyn DynDigest>> {
        match self {
            HashAlgorithm::Md5 => Ok(Box::<Md5>::default()),
            HashAlgorithm::Sha1 => Ok(Box::<Sha1>::default()),
            HashAlgorithm::Sha256 => Ok(Box::<sha2::Sha256>::default()),
            HashAlgorithm::Sha384 => Ok(Box::<sha2::Sha384>::default()),
            HashAlgorithm::Sha512 => Ok(Box::<sha2::Sha512>::default()),
            HashAlgorithm::Sha224 => Ok(Box::<sha2::Sha224>::default()),
            _ => unsupported_err!("hasher: {:?}", self),
        }
    }

    /// Calculate the digest of the given input data.
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(match self {
            HashAlgorithm::Md5 => Md5::digest(data).to_vec(),
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => sha2::Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
            HashAlgorithm::Sha224 => sha2::Sha224::digest(data).to_vec(),
            _ => unsupported_err!("hasher: {:?}", self),
        })
    }

    /// Returns the expected digest size for the given algorithm.
    pub fn digest_size(self) -> Option<usize> {
        let size = match self {
            HashAlgorithm::Md5 => <Md5 as Digest>::output_size(),
            HashAlgorithm::Sha1 => <Sha1 as Digest>::output_size(),
            HashAlgorithm::Sha256 => <sha2::Sha256 as Digest>::output_size(),
            HashAlgorithm::Sha384 => <sha2::Sha384 as Digest>::output_size(),
            HashAlgorithm::Sha512 => <sha2::Sha512 as Digest>::output_size(),
            HashAlgorithm::Sha224 => <sha2::Sha224 as Digest>::output_size(),
            _ => return None,
        };
        Some(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_sizes() {
        assert_eq!(HashAlgorithm::Md5.digest_size(), Some(16));
        assert_eq!(HashAlgorithm::Sha1.digest_size(), Some(20));
        assert_eq!(HashAlgorithm::Sha256.digest_size(), Some(32));
        assert_eq!(HashAlgorithm::Sha512.digest_size(), Some(64));
        assert_eq!(HashAlgorithm::Ripemd160.digest_size(), None);
    }

    #[test]
    fn known_sha256() {
        let digest = HashAlgorithm::Sha256.digest(b"abc").unwrap();
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        assert_eq!(HashAlgorithm::from(13u8), HashAlgorithm::Other(13));
        assert!(HashAlgorithm::Other(13).digest(b"abc").is_err());
    }
}
