use std::io;

use bytes::Buf;
use log::debug;

use crate::armor::{self, BlockType, Headers};
use crate::errors::{bail, Error, Result};
use crate::packet::{self, parse_packets, KeyFlags, Packet, Signature};
use crate::composed::key::shared::{SignedKeyDetails, SignedUser};
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId};

/// A public key with its certified user ids and subkeys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPublicKey {
    pub primary_key: packet::PublicKey,
    pub details: SignedKeyDetails,
    pub public_subkeys: Vec<SignedPublicSubkey>,
}

/// A public subkey with its binding signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPublicSubkey {
    pub key: packet::PublicSubkey,
    pub signatures: Vec<Signature>,
}

impl SignedPublicKey {
    pub fn new(
        primary_key: packet::PublicKey,
        details: SignedKeyDetails,
        public_subkeys: Vec<SignedPublicSubkey>,
    ) -> Self {
        SignedPublicKey {
            primary_key,
            details,
            public_subkeys,
        }
    }

    /// Assembles a transferable public key from a packet sequence.
    pub fn from_packets(packets: Vec<Packet>) -> Result<Self> {
        let mut iter = packets.into_iter().peekable();

        let primary_key = match iter.next() {
            Some(Packet::PublicKey(key)) => key,
            _ => return Err(Error::InvalidKeyFormat),
        };

        let mut users = Vec::new();
        let mut public_subkeys = Vec::new();

        while let Some(packet) = iter.next() {
            match packet {
                Packet::Signature(sig) => {
                    // direct key signatures and revocations are not used here
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
                Packet::PublicSubkey(key) => {
                    let mut signatures = Vec::new();
                    while let Some(Packet::Signature(_)) = iter.peek() {
                        if let Some(Packet::Signature(sig)) = iter.next() {
                            signatures.push(sig);
                        }
                    }
                    public_subkeys.push(SignedPublicSubkey { key, signatures });
                }
                _ => return Err(Error::InvalidKeyFormat),
            }
        }

        Ok(SignedPublicKey {
            primary_key,
            details: SignedKeyDetails::new(users)?,
            public_subkeys,
        })
    }

    pub fn from_bytes<B: Buf>(i: B) -> Result<Self> {
        Self::from_packets(parse_packets(i)?)
    }

    /// Parses an armored public key block.
    pub fn from_string(input: &str) -> Result<(Self, Headers)> {
        let (typ, headers, body) = armor::dearmor(input)?;
        if typ != BlockType::PublicKey {
            return Err(Error::InvalidArmorWrappers);
        }
        Ok((Self::from_bytes(&body[..])?, headers))
    }

    /// Verify all self certifications and subkey bindings.
    pub fn verify(&self) -> Result<()> {
        self.details.verify(&self.primary_key)?;
        for subkey in &self.public_subkeys {
            subkey.verify(&self.primary_key)?;
        }
        Ok(())
    }

    pub fn fingerprint(&self) -> Result<Fingerprint> {
        self.primary_key.fingerprint()
    }

    pub fn key_id(&self) -> KeyId {
        self.primary_key.key_id()
    }

    /// The key to encrypt to: an encryption capable subkey when present,
    /// the primary key otherwise.
    pub fn encryption_key(&self) -> Result<&packet::PublicKey> {
        for subkey in &self.public_subkeys {
            if subkey.key_flags().can_encrypt() && subkey.key.key().algorithm().can_encrypt() {
                return Ok(subkey.key.key());
            }
        }

        let flags = self.details.key_flags();
        if (flags == KeyFlags::default() || flags.can_encrypt())
            && self.primary_key.algorithm().can_encrypt()
        {
            return Ok(&self.primary_key);
        }

        bail!("no encryption capable key found");
    }

    /// All keys carried by this certificate, primary first.
    pub fn keys(&self) -> impl Iterator<Item = &packet::PublicKey> {
        std::iter::once(&self.primary_key).chain(self.public_subkeys.iter().map(|s| s.key.key()))
    }

    pub fn to_armored_string(&self, headers: Option<&Headers>) -> Result<String> {
        armor::to_armored_string(self, BlockType::PublicKey, headers)
    }
}

impl Serialize for SignedPublicKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        Packet::PublicKey(self.primary_key.clone()).to_writer(writer)?;
        self.details.to_writer(writer)?;
        for subkey in &self.public_subkeys {
            subkey.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = Packet::PublicKey(self.primary_key.clone()).write_len();
        sum += self.details.write_len();
        sum += self
            .public_subkeys
            .iter()
            .map(Serialize::write_len)
            .sum::<usize>();
        sum
    }
}

impl SignedPublicSubkey {
    pub fn new(key: packet::PublicSubkey, signatures: Vec<Signature>) -> Self {
        SignedPublicSubkey { key, signatures }
    }

    pub fn verify(&self, primary: &packet::PublicKey) -> Result<()> {
        if self.signatures.is_empty() {
            return Err(Error::InvalidKeyFormat);
        }
        for signature in &self.signatures {
            signature.verify_subkey_binding(primary, self.key.key())?;
        }
        Ok(())
    }

    pub fn key_flags(&self) -> KeyFlags {
        self.signatures
            .first()
            .map(|s| s.key_flags())
            .unwrap_or_default()
    }
}

impl Serialize for SignedPublicSubkey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        Packet::PublicSubkey(self.key.clone()).to_writer(writer)?;
        for signature in &self.signatures {
            Packet::Signature(signature.clone()).to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = Packet::PublicSubkey(self.key.clone()).write_len();
        sum += self
            .signatures
            .iter()
            .map(|s| Packet::Signature(s.clone()).write_len())
            .sum::<usize>();
        sum
    }
}
