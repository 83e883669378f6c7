use std::io;

use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};
use rand::{CryptoRng, Rng};

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{bail, ensure_eq, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;

/// Symmetrically Encrypted Integrity Protected Data Packet (SEIPD), version 1.
///
/// Carries the OpenPGP CFB encrypted message body, with the random prefix,
/// quick check octets and trailing modification detection code handled by
/// [`SymmetricKeyAlgorithm::encrypt_protected`].
///
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.13>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymEncryptedProtectedData {
    data: Bytes,
}

impl SymEncryptedProtectedData {
    /// Parses a `SymEncryptedProtectedData` packet from the given buffer.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        ensure_eq!(version, 1, "unsupported seipd version");

        Ok(SymEncryptedProtectedData { data: i.rest() })
    }

    /// Encrypts the given plaintext with integrity protection.
    pub fn encrypt_with_rng<R: CryptoRng + Rng>(
        rng: &mut R,
        alg: SymmetricKeyAlgorithm,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Self> {
        let data = alg.encrypt_protected(rng, key, plaintext)?;

        Ok(SymEncryptedProtectedData { data: data.into() })
    }

    /// Decrypts the contained data, verifying the integrity protection.
    pub fn decrypt(&self, alg: SymmetricKeyAlgorithm, key: &[u8]) -> Result<Vec<u8>> {
        alg.decrypt_protected(key, &self.data)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for SymEncryptedProtectedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(1)?;
        writer.write_all(&self.data)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::errors::Error;

    #[test]
    fn roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let alg = SymmetricKeyAlgorithm::AES256;
        let key = alg.new_session_key(&mut rng).unwrap();

        let edata =
            SymEncryptedProtectedData::encrypt_with_rng(&mut rng, alg, &key, b"Hello, World!")
                .unwrap();

        let buf = edata.to_bytes().unwrap();
        assert_eq!(buf.len(), edata.write_len());
        let back = SymEncryptedProtectedData::from_buf(&buf[..]).unwrap();
        assert_eq!(back, edata);

        assert_eq!(back.decrypt(alg, &key).unwrap(), b"Hello, World!");
    }

    #[test]
    fn tampered_data_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let alg = SymmetricKeyAlgorithm::AES128;
        let key = alg.new_session_key(&mut rng).unwrap();

        let edata =
            SymEncryptedProtectedData::encrypt_with_rng(&mut rng, alg, &key, b"payload").unwrap();

        let mut data = edata.data().to_vec();
        let last = data.len() - 1;
        data[last] ^= 0x01;
        let tampered = SymEncryptedProtectedData { data: data.into() };
        assert!(matches!(
            tampered.decrypt(alg, &key).unwrap_err(),
            Error::MdcError | Error::DecryptionFailed
        ));
    }
}
