use std::io;

use bytes::Buf;
use chrono::{SubsecRound, Utc};

use crate::armor::{self, BlockType, Headers};
use crate::composed::{SignedPublicKey, SignedSecretKey};
use crate::crypto::hash::HashAlgorithm;
use crate::errors::{bail, Error, Result};
use crate::packet::{
    parse_packets, Packet, Signature, SignatureConfig, SignatureType, Subpacket, SubpacketData,
};
use crate::ser::Serialize;
use crate::types::{KeyId, Password};

/// A detached signature, shipped separately from the signed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandaloneSignature {
    pub signature: Signature,
}

impl StandaloneSignature {
    pub fn new(signature: Signature) -> Self {
        StandaloneSignature { signature }
    }

    /// Creates a detached signature over the given data.
    pub fn sign(
        key: &SignedSecretKey,
        key_pw: &Password,
        hash_alg: HashAlgorithm,
        data: &[u8],
    ) -> Result<Self> {
        let mut config = SignatureConfig::v4(
            SignatureType::Binary,
            key.primary_key.public_key().algorithm(),
            hash_alg,
        );
        config.hashed_subpackets = vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(
                Utc::now().trunc_subsecs(0),
            )),
            Subpacket::regular(SubpacketData::IssuerFingerprint(key.fingerprint()?)),
        ];
        config.unhashed_subpackets =
            vec![Subpacket::regular(SubpacketData::Issuer(key.key_id()))];

        let signature = config.sign(&key.primary_key, key_pw, data)?;

        Ok(StandaloneSignature { signature })
    }

    /// Verifies this signature over the given data.
    pub fn verify(&self, key: &SignedPublicKey, data: &[u8]) -> Result<()> {
        let issuer = self.signature.issuer_key_id();
        let verification_key = match issuer {
            Some(issuer) => key
                .keys()
                .find(|k| k.key_id() == issuer)
                .ok_or_else(|| Error::Message {
                    message: format!("no key matching issuer {:?}", issuer),
                })?,
            None => &key.primary_key,
        };

        self.signature.verify(verification_key, data)
    }

    /// Checks this signature against each key on its own.
    pub fn verify_many(
        &self,
        keys: &[&SignedPublicKey],
        data: &[u8],
    ) -> Vec<(KeyId, bool)> {
        keys.iter()
            .map(|key| (key.key_id(), self.verify(key, data).is_ok()))
            .collect()
    }

    /// Parses a signature from a packet stream.
    pub fn from_bytes<B: Buf>(i: B) -> Result<Self> {
        let packets = parse_packets(i)?;
        match <[Packet; 1]>::try_from(packets) {
            Ok([Packet::Signature(signature)]) => Ok(StandaloneSignature { signature }),
            _ => bail!("expected a single signature packet"),
        }
    }

    /// Parses an armored signature block.
    pub fn from_string(input: &str) -> Result<(Self, Headers)> {
        let (typ, headers, body) = armor::dearmor(input)?;
        if typ != BlockType::Signature {
            return Err(Error::InvalidArmorWrappers);
        }
        Ok((Self::from_bytes(&body[..])?, headers))
    }

    pub fn to_armored_string(&self, headers: Option<&Headers>) -> Result<String> {
        armor::to_armored_string(self, BlockType::Signature, headers)
    }
}

impl Serialize for StandaloneSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        Packet::Signature(self.signature.clone()).to_writer(writer)
    }

    fn write_len(&self) -> usize {
        Packet::Signature(self.signature.clone()).write_len()
    }
}
