mod compressed_data;
mod header;
pub mod key;
mod literal_data;
mod many;
mod one_pass_signature;
mod public_key_encrypted_session_key;
pub mod signature;
mod sym_encrypted_protected_data;
mod sym_key_encrypted_session_key;
mod user_id;

use std::io;

use bytes::Bytes;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::{unsupported_err, Result};
use crate::ser::Serialize;

pub use self::compressed_data::CompressedData;
pub use self::header::{PacketHeader, PacketHeaderVersion, PacketLength};
pub use self::key::{PublicKey, PublicSubkey, SecretKey, SecretSubkey};
pub use self::literal_data::{DataMode, LiteralData};
pub use self::many::parse_packets;
pub use self::one_pass_signature::OnePassSignature;
pub use self::public_key_encrypted_session_key::PublicKeyEncryptedSessionKey;
pub use self::signature::{
    KeyFlags, Signature, SignatureConfig, SignatureType, Subpacket, SubpacketData,
};
pub use self::sym_encrypted_protected_data::SymEncryptedProtectedData;
pub use self::sym_key_encrypted_session_key::SymKeyEncryptedSessionKey;
pub use self::user_id::UserId;

/// Packet tags.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-4.3>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Tag {
    PublicKeyEncryptedSessionKey = 1,
    Signature = 2,
    SymKeyEncryptedSessionKey = 3,
    OnePassSignature = 4,
    SecretKey = 5,
    PublicKey = 6,
    SecretSubkey = 7,
    CompressedData = 8,
    SymEncryptedData = 9,
    Marker = 10,
    LiteralData = 11,
    Trust = 12,
    UserId = 13,
    PublicSubkey = 14,
    SymEncryptedProtectedData = 18,
    ModDetectionCode = 19,

    #[num_enum(catch_all)]
    Other(u8),
}

/// A single OpenPGP packet: tag plus parsed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    CompressedData(CompressedData),
    LiteralData(LiteralData),
    OnePassSignature(OnePassSignature),
    PublicKey(PublicKey),
    PublicSubkey(PublicSubkey),
    SecretKey(SecretKey),
    SecretSubkey(SecretSubkey),
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    Signature(Signature),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
    UserId(UserId),
}

impl Packet {
    /// Parses the packet body for the given tag.
    pub fn from_parts(tag: Tag, mut body: Bytes) -> Result<Self> {
        let packet = match tag {
            Tag::CompressedData => Packet::CompressedData(CompressedData::from_buf(body)?),
            Tag::LiteralData => Packet::LiteralData(LiteralData::from_buf(body)?),
            Tag::OnePassSignature => {
                Packet::OnePassSignature(OnePassSignature::from_buf(body)?)
            }
            Tag::PublicKey => Packet::PublicKey(PublicKey::from_buf(&mut body)?),
            Tag::PublicSubkey => Packet::PublicSubkey(PublicSubkey::from_buf(&mut body)?),
            Tag::SecretKey => Packet::SecretKey(SecretKey::from_buf(&mut body)?),
            Tag::SecretSubkey => Packet::SecretSubkey(SecretSubkey::from_buf(&mut body)?),
            Tag::PublicKeyEncryptedSessionKey => Packet::PublicKeyEncryptedSessionKey(
                PublicKeyEncryptedSessionKey::from_buf(body)?,
            ),
            Tag::Signature => Packet::Signature(Signature::from_buf(body)?),
            Tag::SymEncryptedProtectedData => Packet::SymEncryptedProtectedData(
                SymEncryptedProtectedData::from_buf(body)?,
            ),
            Tag::SymKeyEncryptedSessionKey => Packet::SymKeyEncryptedSessionKey(
                SymKeyEncryptedSessionKey::from_buf(body)?,
            ),
            Tag::UserId => Packet::UserId(UserId::from_buf(body)?),
            Tag::SymEncryptedData
            | Tag::Marker
            | Tag::Trust
            | Tag::ModDetectionCode
            | Tag::Other(_) => {
                unsupported_err!("packet tag {:?}", tag);
            }
        };

        Ok(packet)
    }

    pub fn tag(&self) -> Tag {
        match self {
            Packet::CompressedData(_) => Tag::CompressedData,
            Packet::LiteralData(_) => Tag::LiteralData,
            Packet::OnePassSignature(_) => Tag::OnePassSignature,
            Packet::PublicKey(_) => Tag::PublicKey,
            Packet::PublicSubkey(_) => Tag::PublicSubkey,
            Packet::SecretKey(_) => Tag::SecretKey,
            Packet::SecretSubkey(_) => Tag::SecretSubkey,
            Packet::PublicKeyEncryptedSessionKey(_) => Tag::PublicKeyEncryptedSessionKey,
            Packet::Signature(_) => Tag::Signature,
            Packet::SymEncryptedProtectedData(_) => Tag::SymEncryptedProtectedData,
            Packet::SymKeyEncryptedSessionKey(_) => Tag::SymKeyEncryptedSessionKey,
            Packet::UserId(_) => Tag::UserId,
        }
    }

    fn body_len(&self) -> usize {
        match self {
            Packet::CompressedData(p) => p.write_len(),
            Packet::LiteralData(p) => p.write_len(),
            Packet::OnePassSignature(p) => p.write_len(),
            Packet::PublicKey(p) => p.write_len(),
            Packet::PublicSubkey(p) => p.write_len(),
            Packet::SecretKey(p) => p.write_len(),
            Packet::SecretSubkey(p) => p.write_len(),
            Packet::PublicKeyEncryptedSessionKey(p) => p.write_len(),
            Packet::Signature(p) => p.write_len(),
            Packet::SymEncryptedProtectedData(p) => p.write_len(),
            Packet::SymKeyEncryptedSessionKey(p) => p.write_len(),
            Packet::UserId(p) => p.write_len(),
        }
    }

    fn body_to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Packet::CompressedData(p) => p.to_writer(writer),
            Packet::LiteralData(p) => p.to_writer(writer),
            Packet::OnePassSignature(p) => p.to_writer(writer),
            Packet::PublicKey(p) => p.to_writer(writer),
            Packet::PublicSubkey(p) => p.to_writer(writer),
            Packet::SecretKey(p) => p.to_writer(writer),
            Packet::SecretSubkey(p) => p.to_writer(writer),
            Packet::PublicKeyEncryptedSessionKey(p) => p.to_writer(writer),
            Packet::Signature(p) => p.to_writer(writer),
            Packet::SymEncryptedProtectedData(p) => p.to_writer(writer),
            Packet::SymKeyEncryptedSessionKey(p) => p.to_writer(writer),
            Packet::UserId(p) => p.to_writer(writer),
        }
    }
}

impl Serialize for Packet {
    /// Packets are always written with a new format header and a fixed
    /// length, whatever the framing they were parsed from.
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let header = PacketHeader::new_fixed(self.tag(), self.body_len());
        header.to_writer(writer)?;
        self.body_to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        let body_len = self.body_len();
        PacketHeader::new_fixed(self.tag(), body_len).write_len() + body_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for id in 0u8..64 {
            assert_eq!(u8::from(Tag::from(id)), id);
        }
        assert_eq!(Tag::from(11u8), Tag::LiteralData);
        assert_eq!(Tag::from(18u8), Tag::SymEncryptedProtectedData);
    }

    #[test]
    fn unsupported_tags_rejected() {
        assert!(Packet::from_parts(Tag::Marker, Bytes::from_static(b"PGP")).is_err());
        assert!(Packet::from_parts(Tag::Other(63), Bytes::new()).is_err());
    }
}
