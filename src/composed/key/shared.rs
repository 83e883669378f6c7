use std::io;

use chrono::{SubsecRound, Utc};

use crate::errors::{ensure, Error, Result};
use crate::packet::{
    self, KeyFlags, Packet, Signature, SignatureConfig, SignatureType, Subpacket, SubpacketData,
};
use crate::packet::UserId;
use crate::ser::Serialize;
use crate::types::Password;

/// The hash algorithm used for self signatures.
pub(crate) const SELF_SIGNATURE_HASH: crate::crypto::hash::HashAlgorithm =
    crate::crypto::hash::HashAlgorithm::Sha256;

/// User ids of a key, not yet certified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDetails {
    user_ids: Vec<UserId>,
    key_flags: KeyFlags,
}

impl KeyDetails {
    pub fn new(user_ids: Vec<UserId>, key_flags: KeyFlags) -> Self {
        KeyDetails {
            user_ids,
            key_flags,
        }
    }

    /// Certify all user ids with the given primary key.
    pub fn sign(self, key: &packet::SecretKey, key_pw: &Password) -> Result<SignedKeyDetails> {
        ensure!(
            !self.user_ids.is_empty(),
            "a key requires at least one user id"
        );

        let users = self
            .user_ids
            .into_iter()
            .map(|id| {
                let mut config = SignatureConfig::v4(
                    SignatureType::CertPositive,
                    key.public_key().algorithm(),
                    SELF_SIGNATURE_HASH,
                );
                config.hashed_subpackets = vec![
                    Subpacket::regular(SubpacketData::SignatureCreationTime(
                        Utc::now().trunc_subsecs(0),
                    )),
                    Subpacket::regular(SubpacketData::IssuerFingerprint(
                        key.public_key().fingerprint()?,
                    )),
                    Subpacket::regular(SubpacketData::KeyFlags(self.key_flags)),
                ];
                config.unhashed_subpackets = vec![Subpacket::regular(SubpacketData::Issuer(
                    key.public_key().key_id(),
                ))];

                let sig = config.sign_certificate(key, key_pw, &id)?;
                Ok(SignedUser::new(id, vec![sig]))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SignedKeyDetails { users })
    }
}

/// A user id together with its certification signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUser {
    pub id: UserId,
    pub signatures: Vec<Signature>,
}

impl SignedUser {
    pub fn new(id: UserId, signatures: Vec<Signature>) -> Self {
        SignedUser { id, signatures }
    }

    /// Verify all certifications of this user id against the given key.
    pub fn verify(&self, key: &packet::PublicKey) -> Result<()> {
        ensure!(!self.signatures.is_empty(), "no certification signature");
        for signature in &self.signatures {
            signature.verify_certificate(key, &self.id)?;
        }
        Ok(())
    }
}

impl Serialize for SignedUser {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        Packet::UserId(self.id.clone()).to_writer(writer)?;
        for signature in &self.signatures {
            Packet::Signature(signature.clone()).to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = Packet::UserId(self.id.clone()).write_len();
        sum += self
            .signatures
            .iter()
            .map(|s| Packet::Signature(s.clone()).write_len())
            .sum::<usize>();
        sum
    }
}

/// User ids of a key, with their certification signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedKeyDetails {
    pub users: Vec<SignedUser>,
}

impl SignedKeyDetails {
    pub fn new(users: Vec<SignedUser>) -> Result<Self> {
        if users.is_empty() {
            return Err(Error::InvalidKeyFormat);
        }
        Ok(SignedKeyDetails { users })
    }

    pub fn verify(&self, key: &packet::PublicKey) -> Result<()> {
        for user in &self.users {
            user.verify(key)?;
        }
        Ok(())
    }

    /// The key flags from the first user certification.
    pub fn key_flags(&self) -> KeyFlags {
        self.users
            .first()
            .and_then(|u| u.signatures.first())
            .map(|s| s.key_flags())
            .unwrap_or_default()
    }
}

impl Serialize for SignedKeyDetails {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for user in &self.users {
            user.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.users.iter().map(Serialize::write_len).sum()
    }
}
