use std::io;

use bytes::Buf;
use log::debug;

use crate::armor::{self, BlockType, Headers};
use crate::composed::key::public::{SignedPublicKey, SignedPublicSubkey};
use crate::composed::key::shared::{KeyDetails, SignedKeyDetails, SignedUser};
use crate::errors::{Error, Result};
use crate::packet::{self, parse_packets, Packet, Signature};
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, Password};

/// A generated secret key, before self signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    primary_key: packet::SecretKey,
    details: KeyDetails,
}

impl SecretKey {
    pub fn new(primary_key: packet::SecretKey, details: KeyDetails) -> Self {
        SecretKey {
            primary_key,
            details,
        }
    }

    /// Self certify all user ids, producing a transferable secret key.
    pub fn sign(self, key_pw: &Password) -> Result<SignedSecretKey> {
        let details = self.details.sign(&self.primary_key, key_pw)?;

        Ok(SignedSecretKey {
            primary_key: self.primary_key,
            details,
            secret_subkeys: Vec::new(),
        })
    }
}

/// A secret key with its certified user ids and bound subkeys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSecretKey {
    pub primary_key: packet::SecretKey,
    pub details: SignedKeyDetails,
    pub secret_subkeys: Vec<SignedSecretSubkey>,
}

/// A secret subkey with its binding signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSecretSubkey {
    pub key: packet::SecretSubkey,
    pub signatures: Vec<Signature>,
}

impl SignedSecretKey {
    /// Assembles a transferable secret key from a packet sequence.
    pub fn from_packets(packets: Vec<Packet>) -> Result<Self> {
        let mut iter = packets.into_iter().peekable();

        let primary_key = match iter.next() {
            Some(Packet::SecretKey(key)) => key,
            _ => return Err(Error::InvalidKeyFormat),
        };

        let mut users = Vec::new();
        let mut secret_subkeys = Vec::new();

        while let Some(packet) = iter.next() {
            match packet {
                Packet::Signature(sig) => {
                    debug!("ignoring direct key signature {:?}", sig.typ());
                }
                Packet::UserId(id) => {
                    let mut signatures = Vec::new();
                    while let Some(Packet::Signature(_)) = iter.peek() {
                        if let Some(Packet::Signature(sig)) = iter.next() {
                            signatures.push(sig);
                        }
                    }
                    // every user id must carry at least one certification
                    if signatures.is_empty() {
                        return Err(Error::InvalidKeyFormat);
                    }
                    users.push(SignedUser::new(id, signatures));
                }
                Packet::SecretSubkey(key) => {
                    let mut signatures = Vec::new();
                    while let Some(Packet::Signature(_)) = iter.peek() {
                        if let Some(Packet::Signature(sig)) = iter.next() {
                            signatures.push(sig);
                        }
                    }
                    secret_subkeys.push(SignedSecretSubkey { key, signatures });
                }
                _ => return Err(Error::InvalidKeyFormat),
            }
        }

        Ok(SignedSecretKey {
            primary_key,
            details: SignedKeyDetails::new(users)?,
            secret_subkeys,
        })
    }

    pub fn from_bytes<B: Buf>(i: B) -> Result<Self> {
        Self::from_packets(parse_packets(i)?)
    }

    /// Parses an armored private key block.
    pub fn from_string(input: &str) -> Result<(Self, Headers)> {
        let (typ, headers, body) = armor::dearmor(input)?;
        if typ != BlockType::PrivateKey {
            return Err(Error::InvalidArmorWrappers);
        }
        Ok((Self::from_bytes(&body[..])?, headers))
    }

    /// Verify all self certifications and subkey bindings.
    pub fn verify(&self) -> Result<()> {
        let public = self.primary_key.public_key();
        self.details.verify(public)?;
        for subkey in &self.secret_subkeys {
            subkey.verify(public)?;
        }
        Ok(())
    }

    /// Checks that the given passphrase unlocks the primary key.
    pub fn unlock(&self, key_pw: &Password) -> Result<()> {
        self.primary_key.unlock(key_pw)?;
        Ok(())
    }

    pub fn fingerprint(&self) -> Result<Fingerprint> {
        self.primary_key.public_key().fingerprint()
    }

    pub fn key_id(&self) -> KeyId {
        self.primary_key.public_key().key_id()
    }

    /// The public parts of this key.
    pub fn public_key(&self) -> SignedPublicKey {
        SignedPublicKey::new(
            self.primary_key.public_key().clone(),
            self.details.clone(),
            self.secret_subkeys
                .iter()
                .map(|subkey| {
                    SignedPublicSubkey::new(subkey.key.public_subkey(), subkey.signatures.clone())
                })
                .collect(),
        )
    }

    /// All secret key packets carried by this key, primary first.
    pub fn secret_key_packets(&self) -> impl Iterator<Item = &packet::SecretKey> {
        std::iter::once(&self.primary_key).chain(self.secret_subkeys.iter().map(|s| s.key.key()))
    }

    pub fn to_armored_string(&self, headers: Option<&Headers>) -> Result<String> {
        armor::to_armored_string(self, BlockType::PrivateKey, headers)
    }
}

impl Serialize for SignedSecretKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        Packet::SecretKey(self.primary_key.clone()).to_writer(writer)?;
        self.details.to_writer(writer)?;
        for subkey in &self.secret_subkeys {
            subkey.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = Packet::SecretKey(self.primary_key.clone()).write_len();
        sum += self.details.write_len();
        sum += self
            .secret_subkeys
            .iter()
            .map(Serialize::write_len)
            .sum::<usize>();
        sum
    }
}

impl SignedSecretSubkey {
    pub fn verify(&self, primary: &packet::PublicKey) -> Result<()> {
        if self.signatures.is_empty() {
            return Err(Error::InvalidKeyFormat);
        }
        for signature in &self.signatures {
            signature.verify_subkey_binding(primary, self.key.key().public_key())?;
        }
        Ok(())
    }
}

impl Serialize for SignedSecretSubkey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        Packet::SecretSubkey(self.key.clone()).to_writer(writer)?;
        for signature in &self.signatures {
            Packet::Signature(signature.clone()).to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = Packet::SecretSubkey(self.key.clone()).write_len();
        sum += self
            .signatures
            .iter()
            .map(|s| Packet::Signature(s.clone()).write_len())
            .sum::<usize>();
        sum
    }
}

#[cfg(test)]
mod tests {
    use chrono::{SubsecRound, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::public_key::PublicKeyAlgorithm;
    use crate::crypto::rsa::generate_key;
    use crate::packet::UserId;
    use crate::types::SecretParams;

    #[test]
    fn uncertified_user_id_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (public_params, secret_params) = generate_key(&mut rng, 1024).unwrap();
        let details = packet::PublicKey::new(
            PublicKeyAlgorithm::RSA,
            Utc::now().trunc_subsecs(0),
            public_params,
        );
        let primary = packet::SecretKey::new(details, SecretParams::Plain(secret_params));

        let packets = vec![
            Packet::SecretKey(primary),
            Packet::UserId(UserId::from_str("Jon <jon@example.org>")),
        ];
        assert!(matches!(
            SignedSecretKey::from_packets(packets).unwrap_err(),
            Error::InvalidKeyFormat
        ));
    }
}
