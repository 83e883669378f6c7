use std::io;

use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{bail, ensure_eq, Error, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{Password, StringToKey};

/// Symmetric Key Encrypted Session Key Packet (SKESK), version 4.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.3>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymKeyEncryptedSessionKey {
    sym_algorithm: SymmetricKeyAlgorithm,
    s2k: StringToKey,
    /// When empty, the s2k derived key is the session key itself.
    encrypted_key: Bytes,
}

impl SymKeyEncryptedSessionKey {
    /// Parses a `SymKeyEncryptedSessionKey` packet from the given buffer.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        ensure_eq!(version, 4, "unsupported skesk version");

        let sym_algorithm = SymmetricKeyAlgorithm::from(i.read_u8()?);
        let s2k = StringToKey::from_buf(&mut i)?;
        let encrypted_key = i.rest();

        Ok(SymKeyEncryptedSessionKey {
            sym_algorithm,
            s2k,
            encrypted_key,
        })
    }

    /// Wraps an independently generated session key under a passphrase
    /// derived key encryption key.
    pub fn encrypt<R: Rng + CryptoRng>(
        rng: &mut R,
        passphrase: &Password,
        session_key: &[u8],
        alg: SymmetricKeyAlgorithm,
    ) -> Result<Self> {
        let s2k = StringToKey::new_iterated(rng);
        let kek = s2k.derive_key(passphrase.as_bytes(), alg.key_size())?;

        let mut data = Zeroizing::new(Vec::with_capacity(1 + session_key.len()));
        data.push(u8::from(alg));
        data.extend_from_slice(session_key);

        let iv = vec![0u8; alg.block_size()];
        let mut encrypted_key = data.to_vec();
        alg.encrypt_with_iv_regular(&kek, &iv, &mut encrypted_key)?;

        Ok(SymKeyEncryptedSessionKey {
            sym_algorithm: alg,
            s2k,
            encrypted_key: encrypted_key.into(),
        })
    }

    /// Recovers the session key using the given passphrase.
    pub fn decrypt(
        &self,
        passphrase: &Password,
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)> {
        let kek = self
            .s2k
            .derive_key(passphrase.as_bytes(), self.sym_algorithm.key_size())?;

        if self.encrypted_key.is_empty() {
            return Ok((self.sym_algorithm, kek));
        }

        let mut decrypted = Zeroizing::new(self.encrypted_key.to_vec());
        let iv = vec![0u8; self.sym_algorithm.block_size()];
        self.sym_algorithm
            .decrypt_with_iv_regular(&kek, &iv, &mut decrypted)?;

        if decrypted.is_empty() {
            return Err(Error::DecryptionFailed);
        }

        let alg = SymmetricKeyAlgorithm::from(decrypted[0]);
        if decrypted.len() != 1 + alg.key_size() || alg.key_size() == 0 {
            // no checksum in a v4 skesk, a wrong passphrase surfaces
            // as an implausible session key
            return Err(Error::DecryptionFailed);
        }

        Ok((alg, Zeroizing::new(decrypted[1..].to_vec())))
    }
}

impl Serialize for SymKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(4)?;
        writer.write_u8(self.sym_algorithm.into())?;
        self.s2k.to_writer(writer)?;
        writer.write_all(&self.encrypted_key)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + self.s2k.write_len() + self.encrypted_key.len()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let alg = SymmetricKeyAlgorithm::AES256;
        let session_key = alg.new_session_key(&mut rng).unwrap();

        let skesk =
            SymKeyEncryptedSessionKey::encrypt(&mut rng, &"hunter2".into(), &session_key, alg)
                .unwrap();

        let buf = skesk.to_bytes().unwrap();
        assert_eq!(buf.len(), skesk.write_len());
        let back = SymKeyEncryptedSessionKey::from_buf(&buf[..]).unwrap();
        assert_eq!(back, skesk);

        let (dec_alg, dec_key) = back.decrypt(&"hunter2".into()).unwrap();
        assert_eq!(dec_alg, alg);
        assert_eq!(&dec_key[..], &session_key[..]);
    }

    #[test]
    fn direct_mode_uses_derived_key() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let alg = SymmetricKeyAlgorithm::AES128;
        let s2k = StringToKey::new_iterated(&mut rng);

        let skesk = SymKeyEncryptedSessionKey {
            sym_algorithm: alg,
            s2k: s2k.clone(),
            encrypted_key: Bytes::new(),
        };

        let (dec_alg, dec_key) = skesk.decrypt(&"hunter2".into()).unwrap();
        assert_eq!(dec_alg, alg);
        assert_eq!(
            &dec_key[..],
            &s2k.derive_key(b"hunter2", alg.key_size()).unwrap()[..]
        );
    }
}
