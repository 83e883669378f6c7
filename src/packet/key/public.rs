use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;
use chrono::{DateTime, TimeZone, Utc};
use rand::{CryptoRng, Rng};
use sha1::{Digest, Sha1};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{ensure, unsupported_err, Error, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, Mpi, PublicParams};

/// Public Key Packet, version 4.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.5.2>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    public_params: PublicParams,
}

/// Public Subkey Packet. Same body as a public key, different tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicSubkey(pub PublicKey);

impl PublicKey {
    pub fn new(
        algorithm: PublicKeyAlgorithm,
        created_at: DateTime<Utc>,
        public_params: PublicParams,
    ) -> Self {
        PublicKey {
            algorithm,
            created_at,
            public_params,
        }
    }

    /// Parses a `PublicKey` packet from the given buffer.
    pub fn from_buf<B: Buf>(i: &mut B) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 4 {
            unsupported_err!("key version {}", version);
        }

        let created_at = i.read_be_u32()?;
        let created_at = Utc
            .timestamp_opt(created_at.into(), 0)
            .single()
            .ok_or(Error::InvalidKeyFormat)?;
        let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        let public_params = PublicParams::from_buf(algorithm, i)?;

        Ok(PublicKey {
            algorithm,
            created_at,
            public_params,
        })
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.public_params
    }

    /// The key body framed the way key hashing requires: `0x99`, a two
    /// octet length, and the packet body. Fingerprints, certifications and
    /// bindings all hash this form.
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        let body = self.to_bytes()?;

        let mut res = Vec::with_capacity(3 + body.len());
        res.push(0x99);
        res.write_u16::<BigEndian>(body.len().try_into()?)?;
        res.extend(body);

        Ok(res)
    }

    /// The SHA1 hash over the framed public key body.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        let digest = Sha1::digest(self.signable_bytes()?);
        Fingerprint::from_slice(&digest)
    }

    pub fn key_id(&self) -> KeyId {
        self.fingerprint()
            .map(|fp| fp.key_id())
            .unwrap_or(KeyId::WILDCARD)
    }

    /// Encrypt the given data to this key.
    pub fn encrypt<R: CryptoRng + Rng>(&self, rng: &mut R, plaintext: &[u8]) -> Result<Vec<Mpi>> {
        ensure!(
            self.algorithm.can_encrypt(),
            "key algorithm {:?} can not encrypt",
            self.algorithm
        );

        let PublicParams::RSA { n, e } = &self.public_params;
        crate::crypto::rsa::encrypt(rng, n.as_ref(), e.as_ref(), plaintext)
    }

    /// Verify a signature over the given digest.
    pub fn verify_signature(
        &self,
        hash: HashAlgorithm,
        digest: &[u8],
        sig: &[Mpi],
    ) -> Result<()> {
        ensure!(sig.len() == 1, "invalid amount of rsa signature mpis");

        let PublicParams::RSA { n, e } = &self.public_params;
        crate::crypto::rsa::verify(n.as_ref(), e.as_ref(), hash, digest, sig[0].as_ref())
    }
}

impl Serialize for PublicKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(4)?;
        writer.write_u32::<BigEndian>(self.created_at.timestamp().try_into()?)?;
        writer.write_u8(self.algorithm.into())?;
        self.public_params.to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 4 + 1 + self.public_params.write_len()
    }
}

impl PublicSubkey {
    pub fn from_buf<B: Buf>(i: &mut B) -> Result<Self> {
        Ok(PublicSubkey(PublicKey::from_buf(i)?))
    }

    pub fn key(&self) -> &PublicKey {
        &self.0
    }
}

impl Serialize for PublicSubkey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.0.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        self.0.write_len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::SubsecRound;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::rsa::generate_key;

    fn test_key() -> PublicKey {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (public_params, _) = generate_key(&mut rng, 1024).unwrap();
        PublicKey::new(
            PublicKeyAlgorithm::RSA,
            Utc::now().trunc_subsecs(0),
            public_params,
        )
    }

    #[test]
    fn roundtrip() {
        let key = test_key();
        let buf = key.to_bytes().unwrap();
        assert_eq!(buf.len(), key.write_len());
        assert_eq!(PublicKey::from_buf(&mut &buf[..]).unwrap(), key);
    }

    #[test]
    fn fingerprint_and_key_id() {
        let key = test_key();
        let fp = key.fingerprint().unwrap();
        assert_eq!(fp.as_ref().len(), 20);
        assert_eq!(key.key_id(), fp.key_id());

        // stable across serialization
        let buf = key.to_bytes().unwrap();
        let back = PublicKey::from_buf(&mut &buf[..]).unwrap();
        assert_eq!(back.fingerprint().unwrap(), fp);
    }

    #[test]
    fn unsupported_version() {
        assert!(PublicKey::from_buf(&mut &[3u8, 0, 0, 0, 0, 1][..]).is_err());
    }
}
