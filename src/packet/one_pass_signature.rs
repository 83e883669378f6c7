use std::io;

use byteorder::WriteBytesExt;
use bytes::Buf;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{bail, ensure_eq, Result};
use crate::packet::signature::SignatureType;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::KeyId;

/// One-Pass Signature Packet
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.4>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnePassSignature {
    typ: SignatureType,
    hash_algorithm: HashAlgorithm,
    pub_algorithm: PublicKeyAlgorithm,
    key_id: KeyId,
    /// 0 means another one pass signature packet follows before the
    /// matching signature.
    last: u8,
}

impl OnePassSignature {
    /// Creates a non nested version 3 one pass signature packet.
    pub fn new(
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        key_id: KeyId,
    ) -> Self {
        OnePassSignature {
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last: 1,
        }
    }

    /// Parses a `OnePassSignature` packet from the given buffer.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        ensure_eq!(version, 3, "unsupported one pass signature version");

        let typ = SignatureType::from(i.read_u8()?);
        let hash_algorithm = HashAlgorithm::from(i.read_u8()?);
        let pub_algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        let key_id = KeyId::from_buf(&mut i)?;
        let last = i.read_u8()?;

        Ok(OnePassSignature {
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last,
        })
    }

    pub fn typ(&self) -> SignatureType {
        self.typ
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }
}

impl Serialize for OnePassSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(3)?;
        writer.write_u8(self.typ.into())?;
        writer.write_u8(self.hash_algorithm.into())?;
        writer.write_u8(self.pub_algorithm.into())?;
        writer.write_all(self.key_id.as_ref())?;
        writer.write_u8(self.last)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + 1 + 1 + 8 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let ops = OnePassSignature::new(
            SignatureType::Binary,
            HashAlgorithm::Sha256,
            PublicKeyAlgorithm::RSA,
            KeyId::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
        );

        let buf = ops.to_bytes().unwrap();
        assert_eq!(buf.len(), ops.write_len());
        assert_eq!(OnePassSignature::from_buf(&buf[..]).unwrap(), ops);
    }

    #[test]
    fn unsupported_version() {
        assert!(OnePassSignature::from_buf(&[4u8, 0, 8, 1, 0, 0, 0, 0, 0, 0, 0, 0, 1][..]).is_err());
    }
}
