use std::io;

use bytes::Buf;
use rand::{CryptoRng, Rng};
use rsa::RsaPrivateKey;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{bail, Result};
use crate::packet::key::{PublicKey, PublicSubkey};
use crate::ser::Serialize;
use crate::types::{Mpi, Password, PlainSecretParams, SecretParams};

/// Secret Key Packet, version 4.
///
/// The public part of the key, followed by the (possibly passphrase
/// protected) secret material.
///
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.5.3>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    details: PublicKey,
    secret_params: SecretParams,
}

/// Secret Subkey Packet. Same body as a secret key, different tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSubkey(pub SecretKey);

impl SecretKey {
    pub fn new(details: PublicKey, secret_params: SecretParams) -> Self {
        SecretKey {
            details,
            secret_params,
        }
    }

    /// Parses a `SecretKey` packet from the given buffer.
    pub fn from_buf<B: Buf>(i: &mut B) -> Result<Self> {
        let details = PublicKey::from_buf(i)?;
        let secret_params = SecretParams::from_buf(i)?;

        Ok(SecretKey {
            details,
            secret_params,
        })
    }

    /// The public part of this key.
    pub fn public_key(&self) -> &PublicKey {
        &self.details
    }

    pub fn secret_params(&self) -> &SecretParams {
        &self.secret_params
    }

    pub fn is_locked(&self) -> bool {
        self.secret_params.is_encrypted()
    }

    /// Recovers the private key material, decrypting with `passphrase`
    /// when the key is locked.
    pub fn unlock(&self, passphrase: &Password) -> Result<RsaPrivateKey> {
        let plain = match &self.secret_params {
            SecretParams::Plain(plain) => plain.clone(),
            SecretParams::Encrypted(enc) => enc.unlock(passphrase)?,
        };

        let PlainSecretParams::RSA { d, p, q, .. } = &plain;
        crate::crypto::rsa::private_key_from_mpis(self.details.public_params(), d, p, q)
    }

    /// Locks the secret material under the given passphrase.
    pub fn set_passphrase<R: CryptoRng + Rng>(
        &mut self,
        rng: &mut R,
        passphrase: &Password,
    ) -> Result<()> {
        let SecretParams::Plain(ref plain) = self.secret_params else {
            bail!("secret key material is already locked");
        };

        let encrypted = plain.encrypt(rng, passphrase, SymmetricKeyAlgorithm::AES256)?;
        self.secret_params = SecretParams::Encrypted(encrypted);

        Ok(())
    }

    /// Creates a raw signature over the given digest.
    pub fn create_signature(
        &self,
        key_pw: &Password,
        hash: HashAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<Mpi>> {
        let priv_key = self.unlock(key_pw)?;
        crate::crypto::rsa::sign(&priv_key, hash, digest)
    }

    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        self.details.signable_bytes()
    }
}

impl Serialize for SecretKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.details.to_writer(writer)?;
        self.secret_params.to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        self.details.write_len() + self.secret_params.write_len()
    }
}

impl SecretSubkey {
    pub fn from_buf<B: Buf>(i: &mut B) -> Result<Self> {
        Ok(SecretSubkey(SecretKey::from_buf(i)?))
    }

    pub fn key(&self) -> &SecretKey {
        &self.0
    }

    pub fn public_subkey(&self) -> PublicSubkey {
        PublicSubkey(self.0.public_key().clone())
    }
}

impl Serialize for SecretSubkey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.0.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        self.0.write_len()
    }
}
