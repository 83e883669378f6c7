use std::io;

use bytes::{Buf, Bytes};
use rand::{CryptoRng, Rng};
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{ensure, unsupported_err, Error, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{Mpi, Password, StringToKey};

/// The public parameters of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicParams {
    RSA { n: Mpi, e: Mpi },
}

impl PublicParams {
    pub fn from_buf<B: Buf>(alg: PublicKeyAlgorithm, i: &mut B) -> Result<Self> {
        match alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => {
                let n = Mpi::from_buf(i)?;
                let e = Mpi::from_buf(i)?;
                Ok(PublicParams::RSA { n, e })
            }
            _ => unsupported_err!("public key algorithm {:?}", alg),
        }
    }
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let PublicParams::RSA { n, e } = self;
        n.to_writer(writer)?;
        e.to_writer(writer)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        let PublicParams::RSA { n, e } = self;
        n.write_len() + e.write_len()
    }
}

/// The secret parameters of a key, in the clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlainSecretParams {
    RSA { d: Mpi, p: Mpi, q: Mpi, u: Mpi },
}

impl PlainSecretParams {
    /// Parses the raw secret key material, without usage octet or checksum.
    pub fn from_slice(material: &[u8]) -> Result<Self> {
        let mut i = material;
        let d = Mpi::from_buf(&mut i)?;
        let p = Mpi::from_buf(&mut i)?;
        let q = Mpi::from_buf(&mut i)?;
        let u = Mpi::from_buf(&mut i)?;
        ensure!(!i.has_remaining(), "trailing bytes in secret key material");

        Ok(PlainSecretParams::RSA { d, p, q, u })
    }

    /// Locks the secret material with a passphrase derived key, using the
    /// SHA1 protected form (usage octet 254).
    pub fn encrypt<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        passphrase: &Password,
        sym_alg: SymmetricKeyAlgorithm,
    ) -> Result<EncryptedSecretParams> {
        let s2k = StringToKey::new_iterated(rng);
        let key = s2k.derive_key(passphrase.as_bytes(), sym_alg.key_size())?;

        let mut iv = vec![0u8; sym_alg.block_size()];
        rng.try_fill_bytes(&mut iv)
            .map_err(|_| Error::InsufficientEntropy)?;

        let material = Zeroizing::new(self.to_bytes()?);
        let mut plaintext = Zeroizing::new(Vec::with_capacity(material.len() + 20));
        plaintext.extend_from_slice(&material);
        plaintext.extend_from_slice(&Sha1::digest(&material[..]));

        let mut data = plaintext.to_vec();
        sym_alg.encrypt_with_iv_regular(&key, &iv, &mut data)?;

        Ok(EncryptedSecretParams {
            data: data.into(),
            iv,
            sym_alg,
            s2k,
            checksum_sha1: true,
        })
    }
}

impl Serialize for PlainSecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let PlainSecretParams::RSA { d, p, q, u } = self;
        d.to_writer(writer)?;
        p.to_writer(writer)?;
        q.to_writer(writer)?;
        u.to_writer(writer)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        let PlainSecretParams::RSA { d, p, q, u } = self;
        d.write_len() + p.write_len() + q.write_len() + u.write_len()
    }
}

/// Passphrase protected secret key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSecretParams {
    /// The encrypted material, including the trailing checksum.
    pub data: Bytes,
    pub iv: Vec<u8>,
    pub sym_alg: SymmetricKeyAlgorithm,
    pub s2k: StringToKey,
    /// `true` for usage octet 254 (SHA1 checksum), `false` for 255.
    pub checksum_sha1: bool,
}

impl EncryptedSecretParams {
    /// Decrypts the secret material with the given passphrase.
    ///
    /// A checksum mismatch after decryption is reported as
    /// [`Error::WrongPassphrase`].
    pub fn unlock(&self, passphrase: &Password) -> Result<PlainSecretParams> {
        let key = self
            .s2k
            .derive_key(passphrase.as_bytes(), self.sym_alg.key_size())?;

        let mut plaintext = Zeroizing::new(self.data.to_vec());
        self.sym_alg
            .decrypt_with_iv_regular(&key, &self.iv, &mut plaintext)?;

        let checksum_len = if self.checksum_sha1 { 20 } else { 2 };
        if plaintext.len() < checksum_len {
            return Err(Error::WrongPassphrase);
        }

        let (material, expected) = plaintext.split_at(plaintext.len() - checksum_len);
        let checked = if self.checksum_sha1 {
            checksum::sha1(expected, material)
        } else {
            checksum::simple(expected, material)
        };
        if checked.is_err() {
            return Err(Error::WrongPassphrase);
        }

        PlainSecretParams::from_slice(material)
    }
}

impl Serialize for EncryptedSecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.sym_alg.into()])?;
        self.s2k.to_writer(writer)?;
        writer.write_all(&self.iv)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.s2k.write_len() + self.iv.len() + self.data.len()
    }
}

/// The secret parameters of a key, either in the clear or passphrase
/// protected, as stored in a secret key packet.
///
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.5.3>
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
}

impl SecretParams {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }

    pub fn from_buf<B: Buf>(i: &mut B) -> Result<Self> {
        let usage = i.read_u8()?;
        match usage {
            0 => {
                let body = i.rest();
                if body.len() < 2 {
                    return Err(Error::InvalidKeyFormat);
                }
                let (material, expected) = body.split_at(body.len() - 2);
                checksum::simple(expected, material).map_err(|_| Error::InvalidKeyFormat)?;

                Ok(SecretParams::Plain(PlainSecretParams::from_slice(
                    material,
                )?))
            }
            254 | 255 => {
                let sym_alg = SymmetricKeyAlgorithm::from(i.read_u8()?);
                if sym_alg.block_size() == 0 {
                    unsupported_err!(
                        "SymmetricKeyAlgorithm {} is unsupported",
                        u8::from(sym_alg)
                    );
                }
                let s2k = StringToKey::from_buf(i)?;
                let iv = i.read_take(sym_alg.block_size())?;
                let data = i.rest();

                Ok(SecretParams::Encrypted(EncryptedSecretParams {
                    data,
                    iv: iv.to_vec(),
                    sym_alg,
                    s2k,
                    checksum_sha1: usage == 254,
                }))
            }
            _ => unsupported_err!("secret key protection mode {}", usage),
        }
    }
}

impl Serialize for SecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SecretParams::Plain(plain) => {
                writer.write_all(&[0])?;
                let material = Zeroizing::new(plain.to_bytes()?);
                writer.write_all(&material)?;
                writer.write_all(&checksum::calculate_simple(&material).to_be_bytes())?;
            }
            SecretParams::Encrypted(enc) => {
                writer.write_all(&[if enc.checksum_sha1 { 254 } else { 255 }])?;
                enc.to_writer(writer)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            SecretParams::Plain(plain) => 1 + plain.write_len() + 2,
            SecretParams::Encrypted(enc) => 1 + enc.write_len(),
        }
    }
}
