use std::io;
use std::iter::Peekable;
use std::vec;

use bytes::Buf;
use chrono::{SubsecRound, Utc};
use log::debug;
use rand::{CryptoRng, Rng};

use crate::armor::{self, BlockType, Headers};
use crate::composed::{SignedPublicKey, SignedSecretKey};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{bail, ensure, Error, Result};
use crate::packet::{
    self, parse_packets, CompressedData, LiteralData, OnePassSignature, Packet,
    PublicKeyEncryptedSessionKey, Signature, SignatureConfig, SignatureType, Subpacket,
    SubpacketData, SymEncryptedProtectedData, SymKeyEncryptedSessionKey,
};
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, KeyId, Password};

/// Nesting of compressed and signed layers is capped to bound recursion
/// on attacker supplied input.
const MAX_NESTING: usize = 16;

/// An encrypted session key, leading the encrypted body of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Esk {
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
}

impl Serialize for Esk {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Esk::PublicKeyEncryptedSessionKey(p) => {
                Packet::PublicKeyEncryptedSessionKey(p.clone()).to_writer(writer)
            }
            Esk::SymKeyEncryptedSessionKey(s) => {
                Packet::SymKeyEncryptedSessionKey(s.clone()).to_writer(writer)
            }
        }
    }

    fn write_len(&self) -> usize {
        match self {
            Esk::PublicKeyEncryptedSessionKey(p) => {
                Packet::PublicKeyEncryptedSessionKey(p.clone()).write_len()
            }
            Esk::SymKeyEncryptedSessionKey(s) => {
                Packet::SymKeyEncryptedSessionKey(s.clone()).write_len()
            }
        }
    }
}

/// An OpenPGP message.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-11.3>
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Literal(LiteralData),
    Compressed(CompressedData),
    Signed {
        /// The signed over message. Absent when the signature stands alone
        /// at the end of the packet stream.
        message: Option<Box<Message>>,
        one_pass_signature: Option<OnePassSignature>,
        signature: Signature,
    },
    Encrypted {
        esk: Vec<Esk>,
        edata: SymEncryptedProtectedData,
    },
}

/// The outcome of checking a message signature against one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureVerification {
    pub key_id: KeyId,
    pub valid: bool,
}

impl Message {
    /// A literal message in utf8 mode.
    pub fn new_literal(file_name: impl Into<bytes::Bytes>, raw_data: &str) -> Self {
        Message::Literal(LiteralData::from_str(file_name, raw_data))
    }

    /// A literal message in binary mode.
    pub fn new_literal_bytes(
        file_name: impl Into<bytes::Bytes>,
        data: impl Into<bytes::Bytes>,
    ) -> Self {
        Message::Literal(LiteralData::from_bytes(file_name, data))
    }

    /// Assembles a message from a packet sequence.
    pub fn from_packets(packets: Vec<Packet>) -> Result<Self> {
        let mut iter = packets.into_iter().peekable();
        let message = next_message(&mut iter, 0)?;
        ensure!(iter.peek().is_none(), "trailing packets after message");

        Ok(message)
    }

    pub fn from_bytes<B: Buf>(i: B) -> Result<Self> {
        Self::from_packets(parse_packets(i)?)
    }

    /// Parses an armored message block.
    pub fn from_string(input: &str) -> Result<(Self, Headers)> {
        let (typ, headers, body) = armor::dearmor(input)?;
        if typ != BlockType::Message {
            return Err(Error::InvalidArmorWrappers);
        }
        Ok((Self::from_bytes(&body[..])?, headers))
    }

    /// Compresses this message into a compressed data layer.
    pub fn compress(&self, alg: CompressionAlgorithm) -> Result<Message> {
        let data = self.to_bytes()?;
        Ok(Message::Compressed(CompressedData::compress(alg, &data)?))
    }

    /// Unwraps one layer of compression, returning any other message as is.
    pub fn decompress(self) -> Result<Message> {
        match self {
            Message::Compressed(data) => Message::from_bytes(data.decompress()?),
            other => Ok(other),
        }
    }

    /// Encrypts this message to the given public keys and passphrases.
    ///
    /// A fresh session key is generated and wrapped once per recipient, so
    /// any single recipient can decrypt.
    pub fn encrypt<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        alg: SymmetricKeyAlgorithm,
        keys: &[&SignedPublicKey],
        passwords: &[Password],
    ) -> Result<Message> {
        if keys.is_empty() && passwords.is_empty() {
            return Err(Error::NoRecipients);
        }

        let session_key = alg.new_session_key(rng)?;

        let mut esk = Vec::with_capacity(keys.len() + passwords.len());
        for key in keys {
            let encryption_key = key.encryption_key()?;
            esk.push(Esk::PublicKeyEncryptedSessionKey(
                PublicKeyEncryptedSessionKey::from_session_key(
                    rng,
                    &session_key,
                    alg,
                    encryption_key,
                )?,
            ));
        }
        for password in passwords {
            esk.push(Esk::SymKeyEncryptedSessionKey(
                SymKeyEncryptedSessionKey::encrypt(rng, password, &session_key, alg)?,
            ));
        }

        let edata =
            SymEncryptedProtectedData::encrypt_with_rng(rng, alg, &session_key, &self.to_bytes()?)?;

        Ok(Message::Encrypted { esk, edata })
    }

    pub fn encrypt_to_keys<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        alg: SymmetricKeyAlgorithm,
        keys: &[&SignedPublicKey],
    ) -> Result<Message> {
        self.encrypt(rng, alg, keys, &[])
    }

    pub fn encrypt_with_password<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        alg: SymmetricKeyAlgorithm,
        password: &Password,
    ) -> Result<Message> {
        self.encrypt(rng, alg, &[], std::slice::from_ref(password))
    }

    /// Decrypts this message with any of the given secret keys.
    pub fn decrypt(&self, key_pw: &Password, keys: &[&SignedSecretKey]) -> Result<Message> {
        let Message::Encrypted { esk, edata } = self else {
            bail!("not an encrypted message");
        };

        for key in keys {
            for secret in key.secret_key_packets() {
                let key_id = secret.public_key().key_id();
                for esk in esk {
                    let Esk::PublicKeyEncryptedSessionKey(pkesk) = esk else {
                        continue;
                    };
                    if !pkesk.match_identity(&key_id) {
                        continue;
                    }
                    debug!("decrypting session key with key {:?}", key_id);

                    let priv_key = secret.unlock(key_pw)?;
                    // a wildcard esk may not be ours, keep trying the rest
                    let Ok((alg, session_key)) = pkesk.decrypt(&priv_key) else {
                        continue;
                    };
                    let Ok(data) = edata.decrypt(alg, &session_key) else {
                        continue;
                    };
                    return Message::from_bytes(&data[..]);
                }
            }
        }

        // none of the keys matched an esk
        Err(Error::DecryptionFailed)
    }

    /// Decrypts this message with the given passphrase.
    pub fn decrypt_with_password(&self, password: &Password) -> Result<Message> {
        let Message::Encrypted { esk, edata } = self else {
            bail!("not an encrypted message");
        };

        for esk in esk {
            let Esk::SymKeyEncryptedSessionKey(skesk) = esk else {
                continue;
            };
            // each skesk may use a different passphrase, keep trying
            let Ok((alg, session_key)) = skesk.decrypt(password) else {
                continue;
            };
            let Ok(data) = edata.decrypt(alg, &session_key) else {
                continue;
            };
            return Message::from_bytes(&data[..]);
        }

        // no skesk matched the passphrase
        Err(Error::DecryptionFailed)
    }

    /// Signs this message, wrapping it in a one pass signature.
    pub fn sign(
        self,
        key: &SignedSecretKey,
        key_pw: &Password,
        hash_alg: HashAlgorithm,
    ) -> Result<Message> {
        let algorithm = key.primary_key.public_key().algorithm();
        let key_id = key.key_id();

        let mut config = SignatureConfig::v4(SignatureType::Binary, algorithm, hash_alg);
        config.hashed_subpackets = vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(
                Utc::now().trunc_subsecs(0),
            )),
            Subpacket::regular(SubpacketData::IssuerFingerprint(key.fingerprint()?)),
        ];
        config.unhashed_subpackets = vec![Subpacket::regular(SubpacketData::Issuer(key_id))];

        let signature = config.sign(&key.primary_key, key_pw, &self.signed_content()?)?;
        let one_pass_signature =
            OnePassSignature::new(SignatureType::Binary, hash_alg, algorithm, key_id);

        Ok(Message::Signed {
            message: Some(Box::new(self)),
            one_pass_signature: Some(one_pass_signature),
            signature,
        })
    }

    /// Verifies the signature of this message against the given key.
    pub fn verify(&self, key: &SignedPublicKey) -> Result<()> {
        let Message::Signed {
            message, signature, ..
        } = self
        else {
            bail!("not a signed message");
        };
        let Some(message) = message else {
            bail!("no message content to verify");
        };

        let content = message.signed_content()?;
        signature.verify(verification_key(key, signature)?, &content)
    }

    /// Checks the signature against each key on its own. A key that does
    /// not match or verify does not affect the outcome for the others.
    pub fn verify_many(&self, keys: &[&SignedPublicKey]) -> Vec<SignatureVerification> {
        keys.iter()
            .map(|key| SignatureVerification {
                key_id: key.key_id(),
                valid: self.verify(key).is_ok(),
            })
            .collect()
    }

    /// The bytes a signature over this message covers.
    fn signed_content(&self) -> Result<Vec<u8>> {
        match self {
            Message::Literal(literal) => Ok(literal.data().to_vec()),
            other => other.to_bytes(),
        }
    }

    /// The literal content of this message, unwrapping compression and
    /// signature layers. `None` for encrypted messages.
    pub fn get_content(&self) -> Result<Option<Vec<u8>>> {
        self.content_at_depth(0)
    }

    fn content_at_depth(&self, depth: usize) -> Result<Option<Vec<u8>>> {
        ensure!(depth < MAX_NESTING, "message nesting too deep");

        match self {
            Message::Literal(literal) => Ok(Some(literal.data().to_vec())),
            Message::Compressed(data) => {
                let inner = Message::from_bytes(data.decompress()?)?;
                inner.content_at_depth(depth + 1)
            }
            Message::Signed { message, .. } => match message {
                Some(message) => message.content_at_depth(depth + 1),
                None => Ok(None),
            },
            Message::Encrypted { .. } => Ok(None),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Message::Literal(_))
    }

    pub fn to_armored_string(&self, headers: Option<&Headers>) -> Result<String> {
        armor::to_armored_string(self, BlockType::Message, headers)
    }
}

/// Selects the key a signature should be checked against, by issuer id.
fn verification_key<'a>(
    key: &'a SignedPublicKey,
    signature: &Signature,
) -> Result<&'a packet::PublicKey> {
    match signature.issuer_key_id() {
        Some(issuer) => key
            .keys()
            .find(|k| k.key_id() == issuer)
            .ok_or_else(|| Error::Message {
                message: format!("no key matching issuer {:?}", issuer),
            }),
        None => Ok(&key.primary_key),
    }
}

fn next_message(iter: &mut Peekable<vec::IntoIter<Packet>>, depth: usize) -> Result<Message> {
    ensure!(depth < MAX_NESTING, "message nesting too deep");

    let Some(packet) = iter.next() else {
        bail!("empty message");
    };

    match packet {
        Packet::LiteralData(literal) => Ok(Message::Literal(literal)),
        Packet::CompressedData(data) => Ok(Message::Compressed(data)),
        Packet::OnePassSignature(ops) => {
            let message = next_message(iter, depth + 1)?;
            match iter.next() {
                Some(Packet::Signature(signature)) => Ok(Message::Signed {
                    message: Some(Box::new(message)),
                    one_pass_signature: Some(ops),
                    signature,
                }),
                _ => bail!("one pass signature without matching signature"),
            }
        }
        Packet::Signature(signature) => {
            let message = if iter.peek().is_some() {
                Some(Box::new(next_message(iter, depth + 1)?))
            } else {
                None
            };
            Ok(Message::Signed {
                message,
                one_pass_signature: None,
                signature,
            })
        }
        Packet::PublicKeyEncryptedSessionKey(pkesk) => {
            read_encrypted(iter, Esk::PublicKeyEncryptedSessionKey(pkesk))
        }
        Packet::SymKeyEncryptedSessionKey(skesk) => {
            read_encrypted(iter, Esk::SymKeyEncryptedSessionKey(skesk))
        }
        other => bail!("unexpected packet {:?} in message", other.tag()),
    }
}

fn read_encrypted(iter: &mut Peekable<vec::IntoIter<Packet>>, first: Esk) -> Result<Message> {
    let mut esk = vec![first];

    while let Some(
        Packet::PublicKeyEncryptedSessionKey(_) | Packet::SymKeyEncryptedSessionKey(_),
    ) = iter.peek()
    {
        match iter.next() {
            Some(Packet::PublicKeyEncryptedSessionKey(pkesk)) => {
                esk.push(Esk::PublicKeyEncryptedSessionKey(pkesk));
            }
            Some(Packet::SymKeyEncryptedSessionKey(skesk)) => {
                esk.push(Esk::SymKeyEncryptedSessionKey(skesk));
            }
            _ => break,
        }
    }

    match iter.next() {
        Some(Packet::SymEncryptedProtectedData(edata)) => Ok(Message::Encrypted { esk, edata }),
        _ => bail!("encrypted session keys without encrypted data"),
    }
}

impl Serialize for Message {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Message::Literal(literal) => Packet::LiteralData(literal.clone()).to_writer(writer),
            Message::Compressed(data) => Packet::CompressedData(data.clone()).to_writer(writer),
            Message::Signed {
                message,
                one_pass_signature,
                signature,
            } => {
                if let Some(ops) = one_pass_signature {
                    Packet::OnePassSignature(ops.clone()).to_writer(writer)?;
                    if let Some(message) = message {
                        message.to_writer(writer)?;
                    }
                    Packet::Signature(signature.clone()).to_writer(writer)?;
                } else {
                    Packet::Signature(signature.clone()).to_writer(writer)?;
                    if let Some(message) = message {
                        message.to_writer(writer)?;
                    }
                }
                Ok(())
            }
            Message::Encrypted { esk, edata } => {
                for esk in esk {
                    esk.to_writer(writer)?;
                }
                Packet::SymEncryptedProtectedData(edata.clone()).to_writer(writer)
            }
        }
    }

    fn write_len(&self) -> usize {
        match self {
            Message::Literal(literal) => Packet::LiteralData(literal.clone()).write_len(),
            Message::Compressed(data) => Packet::CompressedData(data.clone()).write_len(),
            Message::Signed {
                message,
                one_pass_signature,
                signature,
            } => {
                let mut sum = one_pass_signature
                    .as_ref()
                    .map(|ops| Packet::OnePassSignature(ops.clone()).write_len())
                    .unwrap_or(0);
                sum += message.as_ref().map(|m| m.write_len()).unwrap_or(0);
                sum += Packet::Signature(signature.clone()).write_len();
                sum
            }
            Message::Encrypted { esk, edata } => {
                let sum: usize = esk.iter().map(Serialize::write_len).sum();
                sum + Packet::SymEncryptedProtectedData(edata.clone()).write_len()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn literal_roundtrip() {
        let message = Message::new_literal("hello.txt", "Hello, World!");

        let buf = message.to_bytes().unwrap();
        assert_eq!(buf.len(), message.write_len());
        let back = Message::from_bytes(&buf[..]).unwrap();
        assert_eq!(back, message);
        assert_eq!(back.get_content().unwrap().unwrap(), b"Hello, World!");
    }

    #[test]
    fn trailing_packets_rejected() {
        let mut buf = Message::new_literal("", "one").to_bytes().unwrap();
        buf.extend_from_slice(&Message::new_literal("", "two").to_bytes().unwrap());

        assert!(Message::from_bytes(&buf[..]).is_err());
    }

    #[test]
    fn compression_roundtrip() {
        let message = Message::new_literal("", &"na ".repeat(100));
        let compressed = message.compress(CompressionAlgorithm::ZLIB).unwrap();
        assert!(compressed.write_len() < message.write_len());

        assert_eq!(
            compressed.get_content().unwrap().unwrap(),
            message.get_content().unwrap().unwrap()
        );
        assert_eq!(compressed.decompress().unwrap(), message);
    }

    #[test]
    fn encryption_needs_a_recipient() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let message = Message::new_literal("", "for nobody");

        let err = message
            .encrypt(&mut rng, SymmetricKeyAlgorithm::AES128, &[], &[])
            .unwrap_err();
        assert!(matches!(err, Error::NoRecipients));
    }

    #[test]
    fn password_encryption_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let message = Message::new_literal("", "shared secret content");

        let encrypted = message
            .encrypt_with_password(&mut rng, SymmetricKeyAlgorithm::AES256, &"hunter2".into())
            .unwrap();
        assert!(encrypted.get_content().unwrap().is_none());

        let buf = encrypted.to_bytes().unwrap();
        let back = Message::from_bytes(&buf[..]).unwrap();
        assert_eq!(back, encrypted);

        let decrypted = back.decrypt_with_password(&"hunter2".into()).unwrap();
        assert_eq!(decrypted, message);

        assert!(back.decrypt_with_password(&"wrong".into()).is_err());
    }
}
