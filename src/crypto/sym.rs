use aes::{Aes128, Aes192, Aes256};
use cfb_mode::cipher::KeyIvInit;
use cfb_mode::{BufDecryptor, BufEncryptor};
use cipher::{BlockCipher, BlockDecrypt, BlockEncryptMut};
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng, RngCore};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::errors::{bail, unsupported_err, Error, Result};

/// MDC trailer: 1 byte packet tag, 1 byte length prefix and 20 bytes SHA1 hash.
const MDC_LEN: usize = 22;

fn encrypt<MODE>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()>
where
    MODE: BlockDecrypt + BlockEncryptMut + BlockCipher,
    BufEncryptor<MODE>: KeyIvInit,
{
    let mut mode = BufEncryptor::<MODE>::new_from_slices(key, iv)?;
    mode.encrypt(data);

    Ok(())
}

fn decrypt<MODE>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()>
where
    MODE: BlockDecrypt + BlockEncryptMut + BlockCipher,
    BufDecryptor<MODE>: KeyIvInit,
{
    let mut mode = BufDecryptor::<MODE>::new_from_slices(key, iv)?;
    mode.decrypt(data);

    Ok(())
}

/// Available symmetric key algorithms.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-9.2>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    Plaintext = 0,
    IDEA = 1,
    TripleDES = 2,
    CAST5 = 3,
    Blowfish = 4,
    /// AES with 128-bit key
    AES128 = 7,
    /// AES with 192-bit key
    AES192 = 8,
    /// AES with 256-bit key
    AES256 = 9,
    Twofish = 10,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for SymmetricKeyAlgorithm {
    fn default() -> Self {
        Self::AES128
    }
}

impl SymmetricKeyAlgorithm {
    /// The size of a single block in bytes.
    pub const fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::IDEA
            | SymmetricKeyAlgorithm::TripleDES
            | SymmetricKeyAlgorithm::CAST5
            | SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::AES128
            | SymmetricKeyAlgorithm::AES192
            | SymmetricKeyAlgorithm::AES256
            | SymmetricKeyAlgorithm::Twofish => 16,
            SymmetricKeyAlgorithm::Plaintext | SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// The key size in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::IDEA
            | SymmetricKeyAlgorithm::CAST5
            | SymmetricKeyAlgorithm::Blowfish
            | SymmetricKeyAlgorithm::AES128 => 16,
            SymmetricKeyAlgorithm::TripleDES | SymmetricKeyAlgorithm::AES192 => 24,
            SymmetricKeyAlgorithm::AES256 | SymmetricKeyAlgorithm::Twofish => 32,
            SymmetricKeyAlgorithm::Plaintext | SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// Generate a new session key from the given secure random source.
    ///
    /// A failing random source is surfaced as [`Error::InsufficientEntropy`],
    /// never silently replaced.
    pub fn new_session_key<R: CryptoRng + RngCore>(
        self,
        rng: &mut R,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let size = self.key_size();
        if size == 0 {
            unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", u8::from(self));
        }
        let mut session_key = Zeroizing::new(vec![0u8; size]);
        rng.try_fill_bytes(&mut session_key)
            .map_err(|_| Error::InsufficientEntropy)?;

        Ok(session_key)
    }

    /// Encrypt the data using OpenPGP CFB with integrity protection.
    ///
    /// The plaintext is prefixed with one block of random data whose last two
    /// octets are repeated (the "quick check"), and followed by an MDC packet
    /// holding a SHA1 hash over prefix and plaintext. The whole construct is
    /// encrypted with an IV of all zeros.
    pub fn encrypt_protected<R: CryptoRng + Rng>(
        self,
        rng: &mut R,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        debug!("protected encrypt {} bytes", plaintext.len());

        let bs = self.block_size();
        if bs == 0 {
            unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", u8::from(self));
        }

        let prefix_len = bs + 2;
        let plaintext_len = plaintext.len();

        let mut ciphertext = vec![0u8; prefix_len + plaintext_len + MDC_LEN];

        // prefix
        rng.try_fill_bytes(&mut ciphertext[..bs])
            .map_err(|_| Error::InsufficientEntropy)?;

        // quick check
        ciphertext[bs] = ciphertext[bs - 2];
        ciphertext[bs + 1] = ciphertext[bs - 1];

        // plaintext
        ciphertext[prefix_len..(prefix_len + plaintext_len)].copy_from_slice(plaintext);
        // mdc header
        ciphertext[prefix_len + plaintext_len] = 0xD3;
        ciphertext[prefix_len + plaintext_len + 1] = 0x14;
        // mdc body
        let checksum = Sha1::digest(&ciphertext[..(prefix_len + plaintext_len + 2)]);
        ciphertext[(prefix_len + plaintext_len + 2)..].copy_from_slice(&checksum);

        // IV is all zeroes
        let iv = vec![0u8; bs];
        self.encrypt_with_iv_regular(key, &iv, &mut ciphertext)?;

        Ok(ciphertext)
    }

    /// Decrypt data produced by [`encrypt_protected`].
    ///
    /// Fails with [`Error::DecryptionFailed`] when the quick check does not
    /// match (wrong key) and with [`Error::MdcError`] when the integrity hash
    /// over the decrypted stream does not match (tampering). Both checks are
    /// constant time.
    ///
    /// [`encrypt_protected`]: SymmetricKeyAlgorithm::encrypt_protected
    pub fn decrypt_protected(self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        debug!("protected decrypt {} bytes", ciphertext.len());

        let bs = self.block_size();
        if bs == 0 {
            unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", u8::from(self));
        }

        let prefix_len = bs + 2;
        if ciphertext.len() < prefix_len + MDC_LEN {
            return Err(Error::DecryptionFailed);
        }

        let mut plaintext = ciphertext.to_vec();
        let iv = vec![0u8; bs];
        self.decrypt_with_iv_regular(key, &iv, &mut plaintext)?;

        // quick check: octets bs and bs+1 repeat octets bs-2 and bs-1
        let quick_check_ok: bool = plaintext[bs - 2..bs].ct_eq(&plaintext[bs..bs + 2]).into();
        if !quick_check_ok {
            return Err(Error::DecryptionFailed);
        }

        let mdc_start = plaintext.len() - MDC_LEN;
        let sha1_expected = Sha1::digest(&plaintext[..mdc_start + 2]);

        let header_ok: bool = plaintext[mdc_start..mdc_start + 2].ct_eq(&[0xD3, 0x14]).into();
        let hash_ok: bool = plaintext[mdc_start + 2..].ct_eq(&sha1_expected).into();
        if !(header_ok && hash_ok) {
            return Err(Error::MdcError);
        }

        Ok(plaintext[prefix_len..mdc_start].to_vec())
    }

    /// Encrypt the data using CFB mode, without padding. Overwrites the input.
    pub fn encrypt_with_iv_regular(self, key: &[u8], iv: &[u8], plaintext: &mut [u8]) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::AES128 => encrypt::<Aes128>(key, iv, plaintext)?,
            SymmetricKeyAlgorithm::AES192 => encrypt::<Aes192>(key, iv, plaintext)?,
            SymmetricKeyAlgorithm::AES256 => encrypt::<Aes256>(key, iv, plaintext)?,
            _ => {
                unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", u8::from(self))
            }
        }
        Ok(())
    }

    /// Decrypt the data using CFB mode, without padding. Overwrites the input.
    pub fn decrypt_with_iv_regular(
        self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &mut [u8],
    ) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::AES128 => decrypt::<Aes128>(key, iv, ciphertext)?,
            SymmetricKeyAlgorithm::AES192 => decrypt::<Aes192>(key, iv, ciphertext)?,
            SymmetricKeyAlgorithm::AES256 => decrypt::<Aes256>(key, iv, ciphertext)?,
            _ => {
                unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", u8::from(self))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn protected_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        for alg in [
            SymmetricKeyAlgorithm::AES128,
            SymmetricKeyAlgorithm::AES192,
            SymmetricKeyAlgorithm::AES256,
        ] {
            let key = alg.new_session_key(&mut rng).unwrap();
            let plaintext = b"hello world, this is a protected message";

            let ciphertext = alg.encrypt_protected(&mut rng, &key, plaintext).unwrap();
            assert_ne!(&ciphertext[..], &plaintext[..]);

            let decrypted = alg.decrypt_protected(&key, &ciphertext).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn wrong_key_fails_quick_check() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let alg = SymmetricKeyAlgorithm::AES256;

        let key = alg.new_session_key(&mut rng).unwrap();
        let wrong_key = alg.new_session_key(&mut rng).unwrap();

        let ciphertext = alg.encrypt_protected(&mut rng, &key, b"secret").unwrap();
        let err = alg.decrypt_protected(&wrong_key, &ciphertext).unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed | Error::MdcError));
    }

    #[test]
    fn tampering_is_detected() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let alg = SymmetricKeyAlgorithm::AES128;
        let key = alg.new_session_key(&mut rng).unwrap();

        let ciphertext = alg
            .encrypt_protected(&mut rng, &key, b"untampered content")
            .unwrap();

        for idx in 0..ciphertext.len() {
            let mut corrupted = ciphertext.clone();
            corrupted[idx] ^= 0x01;
            let err = alg.decrypt_protected(&key, &corrupted).unwrap_err();
            assert!(
                matches!(err, Error::DecryptionFailed | Error::MdcError),
                "flip at {idx} must not go unnoticed"
            );
        }
    }

    #[test]
    fn regular_cfb_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let alg = SymmetricKeyAlgorithm::AES128;
        let key = alg.new_session_key(&mut rng).unwrap();
        let iv = vec![0x42u8; alg.block_size()];

        let mut data = b"some key material".to_vec();
        alg.encrypt_with_iv_regular(&key, &iv, &mut data).unwrap();
        assert_ne!(&data[..], b"some key material");
        alg.decrypt_with_iv_regular(&key, &iv, &mut data).unwrap();
        assert_eq!(&data[..], b"some key material");
    }

    #[test]
    fn unsupported_algorithms_error() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        assert!(SymmetricKeyAlgorithm::Plaintext
            .new_session_key(&mut rng)
            .is_err());
        let mut buf = [0u8; 16];
        assert!(SymmetricKeyAlgorithm::CAST5
            .encrypt_with_iv_regular(&[0u8; 16], &[0u8; 8], &mut buf)
            .is_err());
    }
}
