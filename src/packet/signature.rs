use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, TimeZone, Utc};
use digest::DynDigest;
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{bail, ensure, ensure_eq, unsupported_err, Result};
use crate::packet::key::{PublicKey, SecretKey};
use crate::packet::UserId;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, Mpi, Password};

/// Available signature types.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.2.1>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    /// Signature of a binary document
    Binary = 0x00,
    /// Signature of a canonical text document
    Text = 0x01,
    Standalone = 0x02,
    CertGeneric = 0x10,
    CertPersona = 0x11,
    CertCasual = 0x12,
    CertPositive = 0x13,
    SubkeyBinding = 0x18,
    KeyBinding = 0x19,
    Key = 0x1F,
    KeyRevocation = 0x20,
    SubkeyRevocation = 0x28,
    CertRevocation = 0x30,
    Timestamp = 0x40,
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

/// First octet of the key flags subpacket.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.2.3.21>
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub struct KeyFlags(pub u8);

impl KeyFlags {
    pub const CERTIFY: u8 = 0x01;
    pub const SIGN: u8 = 0x02;
    pub const ENCRYPT_COMMS: u8 = 0x04;
    pub const ENCRYPT_STORAGE: u8 = 0x08;

    pub fn certify_and_sign_and_encrypt() -> Self {
        KeyFlags(Self::CERTIFY | Self::SIGN | Self::ENCRYPT_COMMS | Self::ENCRYPT_STORAGE)
    }

    pub fn can_certify(self) -> bool {
        self.0 & Self::CERTIFY != 0
    }

    pub fn can_sign(self) -> bool {
        self.0 & Self::SIGN != 0
    }

    pub fn can_encrypt(self) -> bool {
        self.0 & (Self::ENCRYPT_COMMS | Self::ENCRYPT_STORAGE) != 0
    }
}

/// A single signature subpacket.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.2.3.1>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subpacket {
    pub is_critical: bool,
    pub data: SubpacketData,
}

impl Subpacket {
    /// A non critical subpacket.
    pub fn regular(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: false,
            data,
        }
    }

    pub fn critical(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: true,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubpacketData {
    /// The time the signature was made.
    SignatureCreationTime(DateTime<Utc>),
    /// Seconds after the creation time after which the signature expires.
    SignatureExpirationTime(u32),
    Issuer(KeyId),
    KeyFlags(KeyFlags),
    IssuerFingerprint(Fingerprint),
    /// Subpacket types without a dedicated representation.
    Other { typ: u8, body: Bytes },
}

impl SubpacketData {
    fn typ(&self) -> u8 {
        match self {
            SubpacketData::SignatureCreationTime(_) => 2,
            SubpacketData::SignatureExpirationTime(_) => 3,
            SubpacketData::Issuer(_) => 16,
            SubpacketData::KeyFlags(_) => 27,
            SubpacketData::IssuerFingerprint(_) => 33,
            SubpacketData::Other { typ, .. } => *typ,
        }
    }

    fn body_len(&self) -> usize {
        match self {
            SubpacketData::SignatureCreationTime(_) => 4,
            SubpacketData::SignatureExpirationTime(_) => 4,
            SubpacketData::Issuer(_) => 8,
            SubpacketData::KeyFlags(_) => 1,
            SubpacketData::IssuerFingerprint(_) => 21,
            SubpacketData::Other { body, .. } => body.len(),
        }
    }

    fn body_to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SubpacketData::SignatureCreationTime(t) => {
                writer.write_u32::<BigEndian>(t.timestamp().try_into()?)?;
            }
            SubpacketData::SignatureExpirationTime(d) => {
                writer.write_u32::<BigEndian>(*d)?;
            }
            SubpacketData::Issuer(id) => {
                writer.write_all(id.as_ref())?;
            }
            SubpacketData::KeyFlags(flags) => {
                writer.write_u8(flags.0)?;
            }
            SubpacketData::IssuerFingerprint(fp) => {
                // key version, then the fingerprint
                writer.write_u8(4)?;
                writer.write_all(fp.as_ref())?;
            }
            SubpacketData::Other { body, .. } => {
                writer.write_all(body)?;
            }
        }
        Ok(())
    }
}

/// Reads a subpacket length (one, two or five octets).
fn read_subpacket_len<B: Buf>(i: &mut B) -> Result<usize> {
    let olen = i.read_u8()?;
    let len = match olen {
        0..=191 => olen as usize,
        192..=254 => {
            let a = i.read_u8()?;
            ((olen as usize - 192) << 8) + 192 + a as usize
        }
        255 => i.read_be_u32()?.try_into()?,
    };
    Ok(len)
}

fn write_subpacket_len<W: io::Write>(writer: &mut W, len: usize) -> Result<()> {
    if len < 192 {
        writer.write_u8(len as u8)?;
    } else if len < 8384 {
        writer.write_u8((((len - 192) >> 8) + 192) as u8)?;
        writer.write_u8(((len - 192) & 0xFF) as u8)?;
    } else {
        writer.write_u8(255)?;
        writer.write_u32::<BigEndian>(len.try_into()?)?;
    }
    Ok(())
}

fn subpacket_len_len(len: usize) -> usize {
    if len < 192 {
        1
    } else if len < 8384 {
        2
    } else {
        5
    }
}

impl Subpacket {
    /// Parses all subpackets contained in the given region.
    pub fn parse_many(mut i: Bytes) -> Result<Vec<Subpacket>> {
        let mut packets = Vec::new();
        while i.has_remaining() {
            // the length includes the type octet
            let len = read_subpacket_len(&mut i)?;
            ensure!(len > 0, "empty signature subpacket");
            let mut body = i.read_take(len)?;

            let typ_raw = body.read_u8()?;
            let is_critical = typ_raw & 0x80 != 0;

            let data = match typ_raw & 0x7F {
                2 => {
                    let created = body.read_be_u32()?;
                    let created = Utc
                        .timestamp_opt(created.into(), 0)
                        .single()
                        .unwrap_or_default();
                    SubpacketData::SignatureCreationTime(created)
                }
                3 => SubpacketData::SignatureExpirationTime(body.read_be_u32()?),
                16 => SubpacketData::Issuer(KeyId::from_buf(&mut body)?),
                27 => SubpacketData::KeyFlags(KeyFlags(body.read_u8()?)),
                33 => {
                    let version = body.read_u8()?;
                    if version == 4 {
                        SubpacketData::IssuerFingerprint(Fingerprint::from_slice(&body.rest())?)
                    } else {
                        let mut raw = vec![version];
                        raw.extend_from_slice(&body.rest());
                        SubpacketData::Other {
                            typ: 33,
                            body: raw.into(),
                        }
                    }
                }
                typ => SubpacketData::Other {
                    typ,
                    body: body.rest(),
                },
            };

            packets.push(Subpacket { is_critical, data });
        }
        Ok(packets)
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        write_subpacket_len(writer, 1 + self.data.body_len())?;

        let mut typ = self.data.typ();
        if self.is_critical {
            typ |= 0x80;
        }
        writer.write_u8(typ)?;
        self.data.body_to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        let body_len = self.data.body_len();
        subpacket_len_len(1 + body_len) + 1 + body_len
    }
}

/// The signed over parts of a version 4 signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureConfig {
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,
    pub hash_alg: HashAlgorithm,
    pub hashed_subpackets: Vec<Subpacket>,
    pub unhashed_subpackets: Vec<Subpacket>,
}

impl SignatureConfig {
    pub fn v4(typ: SignatureType, pub_alg: PublicKeyAlgorithm, hash_alg: HashAlgorithm) -> Self {
        SignatureConfig {
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets: Vec::new(),
            unhashed_subpackets: Vec::new(),
        }
    }

    /// Sign the given data.
    pub fn sign(self, key: &SecretKey, key_pw: &Password, data: &[u8]) -> Result<Signature> {
        debug!("signing {:?} over {} bytes", self.typ, data.len());

        let digest = self.compute_digest(&[data])?;
        let signed_hash_value = [digest[0], digest[1]];
        let signature = key.create_signature(key_pw, self.hash_alg, &digest)?;

        Ok(Signature::from_config(self, signed_hash_value, signature))
    }

    /// Create a certification over the given user id.
    pub fn sign_certificate(
        self,
        key: &SecretKey,
        key_pw: &Password,
        id: &UserId,
    ) -> Result<Signature> {
        ensure!(
            self.is_certificate(),
            "can not sign non certificate as certificate"
        );
        debug!("signing certificate {:?}", self.typ);

        let digest = self.compute_digest(&certificate_content(key.public_key(), id)?)?;
        let signed_hash_value = [digest[0], digest[1]];
        let signature = key.create_signature(key_pw, self.hash_alg, &digest)?;

        Ok(Signature::from_config(self, signed_hash_value, signature))
    }

    /// Sign a subkey binding.
    pub fn sign_subkey_binding(
        self,
        signing_key: &SecretKey,
        key_pw: &Password,
        subkey: &PublicKey,
    ) -> Result<Signature> {
        debug!("signing subkey binding");

        let digest =
            self.compute_digest(&binding_content(signing_key.public_key(), subkey)?)?;
        let signed_hash_value = [digest[0], digest[1]];
        let signature = signing_key.create_signature(key_pw, self.hash_alg, &digest)?;

        Ok(Signature::from_config(self, signed_hash_value, signature))
    }

    /// The full hash for this signature: the content being signed over,
    /// the hashed parts of the signature packet, and the v4 trailer.
    fn compute_digest(&self, content: &[impl AsRef<[u8]>]) -> Result<Vec<u8>> {
        let mut hasher = self.hash_alg.new_hasher()?;

        for chunk in content {
            hasher.update(chunk.as_ref());
        }

        let hashed = self.hashed_portion()?;
        hasher.update(&hashed);
        hasher.update(&[0x04, 0xFF]);
        hasher.update(&u32::try_from(hashed.len())?.to_be_bytes());

        Ok(hasher.finalize().to_vec())
    }

    /// The serialized parts of the signature packet covered by the hash.
    fn hashed_portion(&self) -> Result<Vec<u8>> {
        let mut subpackets = Vec::new();
        for packet in &self.hashed_subpackets {
            packet.to_writer(&mut subpackets)?;
        }

        let mut res = vec![
            4u8,
            self.typ.into(),
            self.pub_alg.into(),
            self.hash_alg.into(),
        ];
        res.extend_from_slice(&u16::try_from(subpackets.len())?.to_be_bytes());
        res.extend(subpackets);

        Ok(res)
    }

    /// Returns an iterator over all subpackets, hashed first.
    pub fn subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.hashed_subpackets
            .iter()
            .chain(self.unhashed_subpackets.iter())
    }

    pub fn is_certificate(&self) -> bool {
        matches!(
            self.typ,
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
                | SignatureType::CertRevocation
        )
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.subpackets().find_map(|p| match &p.data {
            SubpacketData::SignatureCreationTime(d) => Some(d),
            _ => None,
        })
    }

    pub fn issuer(&self) -> Option<&KeyId> {
        self.subpackets().find_map(|p| match &p.data {
            SubpacketData::Issuer(id) => Some(id),
            _ => None,
        })
    }

    pub fn issuer_fingerprint(&self) -> Option<&Fingerprint> {
        self.subpackets().find_map(|p| match &p.data {
            SubpacketData::IssuerFingerprint(fp) => Some(fp),
            _ => None,
        })
    }

    pub fn key_flags(&self) -> KeyFlags {
        self.subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::KeyFlags(flags) => Some(*flags),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Signature Packet, version 4.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.2>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub config: SignatureConfig,
    /// The first two octets of the hash, a fast sanity check.
    pub signed_hash_value: [u8; 2],
    pub signature: Vec<Mpi>,
}

impl Signature {
    pub fn from_config(
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: Vec<Mpi>,
    ) -> Self {
        Signature {
            config,
            signed_hash_value,
            signature,
        }
    }

    /// Parses a `Signature` packet from the given buffer.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 4 {
            unsupported_err!("signature version {}", version);
        }

        let typ = SignatureType::from(i.read_u8()?);
        let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
        let hash_alg = HashAlgorithm::from(i.read_u8()?);

        let hashed_len = i.read_be_u16()?;
        let hashed_subpackets = Subpacket::parse_many(i.read_take(hashed_len.into())?)?;

        let unhashed_len = i.read_be_u16()?;
        let unhashed_subpackets = Subpacket::parse_many(i.read_take(unhashed_len.into())?)?;

        let signed_hash_value = i.read_array::<2>()?;

        let mut signature = Vec::new();
        while i.has_remaining() {
            signature.push(Mpi::from_buf(&mut i)?);
        }

        Ok(Signature {
            config: SignatureConfig {
                typ,
                pub_alg,
                hash_alg,
                hashed_subpackets,
                unhashed_subpackets,
            },
            signed_hash_value,
            signature,
        })
    }

    /// Verify this signature over the given data.
    pub fn verify(&self, key: &PublicKey, data: &[u8]) -> Result<()> {
        self.verify_content(key, &[data])
    }

    /// Verifies a certification signature over the given user id.
    pub fn verify_certificate(&self, key: &PublicKey, id: &UserId) -> Result<()> {
        ensure!(
            self.config.is_certificate(),
            "not a certification signature"
        );
        self.verify_content(key, &certificate_content(key, id)?)
    }

    /// Verifies a subkey binding signature.
    pub fn verify_subkey_binding(
        &self,
        signing_key: &PublicKey,
        subkey: &PublicKey,
    ) -> Result<()> {
        ensure_eq!(
            self.config.typ,
            SignatureType::SubkeyBinding,
            "not a subkey binding signature"
        );
        self.verify_content(signing_key, &binding_content(signing_key, subkey)?)
    }

    fn verify_content(&self, key: &PublicKey, content: &[impl AsRef<[u8]>]) -> Result<()> {
        // an unknown critical subpacket invalidates the signature
        for subpacket in &self.config.hashed_subpackets {
            if subpacket.is_critical {
                if let SubpacketData::Other { typ, .. } = subpacket.data {
                    bail!("unknown critical subpacket {}", typ);
                }
            }
        }

        let digest = self.config.compute_digest(content)?;
        ensure_eq!(
            &digest[..2],
            &self.signed_hash_value[..],
            "signature hash prefix mismatch"
        );

        key.verify_signature(self.config.hash_alg, &digest, &self.signature)
    }

    pub fn typ(&self) -> SignatureType {
        self.config.typ
    }

    /// The id of the issuing key, from the issuer or issuer fingerprint
    /// subpackets.
    pub fn issuer_key_id(&self) -> Option<KeyId> {
        if let Some(id) = self.config.issuer() {
            return Some(*id);
        }
        self.config.issuer_fingerprint().map(Fingerprint::key_id)
    }

    pub fn key_flags(&self) -> KeyFlags {
        self.config.key_flags()
    }
}

/// Hash content for a certification: the signing key, then the user id.
fn certificate_content(key: &PublicKey, id: &UserId) -> Result<Vec<Vec<u8>>> {
    let mut id_prefix = vec![0xB4];
    id_prefix.extend_from_slice(&u32::try_from(id.write_len())?.to_be_bytes());

    Ok(vec![
        key.signable_bytes()?,
        id_prefix,
        id.to_bytes()?,
    ])
}

/// Hash content for a subkey binding: the primary key, then the subkey.
fn binding_content(signing_key: &PublicKey, subkey: &PublicKey) -> Result<Vec<Vec<u8>>> {
    Ok(vec![signing_key.signable_bytes()?, subkey.signable_bytes()?])
}

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(4)?;
        writer.write_u8(self.config.typ.into())?;
        writer.write_u8(self.config.pub_alg.into())?;
        writer.write_u8(self.config.hash_alg.into())?;

        let hashed: usize = self
            .config
            .hashed_subpackets
            .iter()
            .map(Serialize::write_len)
            .sum();
        writer.write_u16::<BigEndian>(hashed.try_into()?)?;
        for packet in &self.config.hashed_subpackets {
            packet.to_writer(writer)?;
        }

        let unhashed: usize = self
            .config
            .unhashed_subpackets
            .iter()
            .map(Serialize::write_len)
            .sum();
        writer.write_u16::<BigEndian>(unhashed.try_into()?)?;
        for packet in &self.config.unhashed_subpackets {
            packet.to_writer(writer)?;
        }

        writer.write_all(&self.signed_hash_value)?;
        for mpi in &self.signature {
            mpi.to_writer(writer)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        let hashed: usize = self
            .config
            .hashed_subpackets
            .iter()
            .map(Serialize::write_len)
            .sum();
        let unhashed: usize = self
            .config
            .unhashed_subpackets
            .iter()
            .map(Serialize::write_len)
            .sum();
        let sig: usize = self.signature.iter().map(Serialize::write_len).sum();

        4 + 2 + hashed + 2 + unhashed + 2 + sig
    }
}

#[cfg(test)]
mod tests {
    use chrono::SubsecRound;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::rsa::generate_key;
    use crate::types::SecretParams;

    fn sample_subpackets() -> Vec<Subpacket> {
        vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(
                Utc::now().trunc_subsecs(0),
            )),
            Subpacket::regular(SubpacketData::Issuer(
                KeyId::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
            )),
            Subpacket::regular(SubpacketData::KeyFlags(
                KeyFlags::certify_and_sign_and_encrypt(),
            )),
            Subpacket::critical(SubpacketData::SignatureExpirationTime(3600)),
            Subpacket::regular(SubpacketData::Other {
                typ: 20,
                body: Bytes::from_static(b"notation"),
            }),
        ]
    }

    #[test]
    fn subpacket_roundtrip() {
        for subpacket in sample_subpackets() {
            let buf = subpacket.to_bytes().unwrap();
            assert_eq!(buf.len(), subpacket.write_len());

            let back = Subpacket::parse_many(buf.into()).unwrap();
            assert_eq!(back, vec![subpacket]);
        }
    }

    #[test]
    fn signature_packet_roundtrip() {
        let sig = Signature::from_config(
            SignatureConfig {
                typ: SignatureType::Binary,
                pub_alg: PublicKeyAlgorithm::RSA,
                hash_alg: HashAlgorithm::Sha256,
                hashed_subpackets: sample_subpackets(),
                unhashed_subpackets: vec![Subpacket::regular(SubpacketData::Issuer(
                    KeyId::from_slice(&[8, 7, 6, 5, 4, 3, 2, 1]).unwrap(),
                ))],
            },
            [0xAB, 0xCD],
            vec![Mpi::from_slice(&[0x01, 0x02, 0x03])],
        );

        let buf = sig.to_bytes().unwrap();
        assert_eq!(buf.len(), sig.write_len());
        assert_eq!(Signature::from_buf(&buf[..]).unwrap(), sig);
    }

    #[test]
    fn key_flags() {
        let flags = KeyFlags::certify_and_sign_and_encrypt();
        assert!(flags.can_certify());
        assert!(flags.can_sign());
        assert!(flags.can_encrypt());

        assert!(!KeyFlags(KeyFlags::SIGN).can_encrypt());
        assert!(KeyFlags(KeyFlags::ENCRYPT_STORAGE).can_encrypt());
    }

    #[test]
    fn unsupported_version_rejected() {
        assert!(Signature::from_buf(&[3u8, 0, 1, 8][..]).is_err());
    }

    #[test]
    fn sign_and_verify_binary() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (public_params, secret_params) = generate_key(&mut rng, 1024).unwrap();
        let public = PublicKey::new(
            PublicKeyAlgorithm::RSA,
            Utc::now().trunc_subsecs(0),
            public_params,
        );
        let key = SecretKey::new(public.clone(), SecretParams::Plain(secret_params));

        let mut config = SignatureConfig::v4(
            SignatureType::Binary,
            PublicKeyAlgorithm::RSA,
            HashAlgorithm::Sha256,
        );
        config.hashed_subpackets = vec![Subpacket::regular(
            SubpacketData::SignatureCreationTime(Utc::now().trunc_subsecs(0)),
        )];

        let sig = config
            .sign(&key, &Password::empty(), b"hello world")
            .unwrap();
        sig.verify(&public, b"hello world").unwrap();
        assert!(sig.verify(&public, b"hello, world").is_err());
    }
}
