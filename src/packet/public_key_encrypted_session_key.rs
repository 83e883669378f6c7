use std::io;

use byteorder::WriteBytesExt;
use bytes::Buf;
use rand::{CryptoRng, Rng};
use rsa::RsaPrivateKey;
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{bail, ensure, ensure_eq, Error, Result};
use crate::packet::key::PublicKey;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Mpi};

/// Public Key Encrypted Session Key Packet (PKESK), version 3.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.1>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    id: KeyId,
    pk_algo: PublicKeyAlgorithm,
    mpis: Vec<Mpi>,
}

impl PublicKeyEncryptedSessionKey {
    /// Parses a `PublicKeyEncryptedSessionKey` packet from the given buffer.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        ensure_eq!(version, 3, "unsupported pkesk version");

        let id = KeyId::from_buf(&mut i)?;
        let pk_algo = PublicKeyAlgorithm::from(i.read_u8()?);

        let mut mpis = Vec::new();
        while i.has_remaining() {
            mpis.push(Mpi::from_buf(&mut i)?);
        }

        Ok(PublicKeyEncryptedSessionKey { id, pk_algo, mpis })
    }

    /// Encrypts the given session key to `pkey`.
    ///
    /// The encrypted payload is the symmetric algorithm octet, the session
    /// key, and a two octet checksum over the session key.
    pub fn from_session_key<R: CryptoRng + Rng>(
        rng: &mut R,
        session_key: &[u8],
        alg: SymmetricKeyAlgorithm,
        pkey: &PublicKey,
    ) -> Result<Self> {
        ensure!(
            pkey.algorithm().can_encrypt(),
            "key algorithm {:?} can not encrypt",
            pkey.algorithm()
        );

        let mut data = Zeroizing::new(Vec::with_capacity(1 + session_key.len() + 2));
        data.push(u8::from(alg));
        data.extend_from_slice(session_key);
        data.extend_from_slice(&checksum::calculate_simple(session_key).to_be_bytes());

        let mpis = pkey.encrypt(rng, &data)?;

        Ok(PublicKeyEncryptedSessionKey {
            id: pkey.key_id(),
            pk_algo: pkey.algorithm(),
            mpis,
        })
    }

    /// Decrypts the contained session key.
    pub fn decrypt(
        &self,
        priv_key: &RsaPrivateKey,
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)> {
        let decrypted = Zeroizing::new(
            crate::crypto::rsa::decrypt(priv_key, &self.mpis)
                .map_err(|_| Error::DecryptionFailed)?,
        );

        if decrypted.len() < 3 {
            return Err(Error::DecryptionFailed);
        }

        let alg = SymmetricKeyAlgorithm::from(decrypted[0]);
        let (session_key, expected) = decrypted[1..].split_at(decrypted.len() - 3);
        checksum::simple(expected, session_key).map_err(|_| Error::DecryptionFailed)?;

        if session_key.len() != alg.key_size() {
            return Err(Error::DecryptionFailed);
        }

        Ok((alg, Zeroizing::new(session_key.to_vec())))
    }

    /// The id of the key this session key is encrypted to.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn match_identity(&self, id: &KeyId) -> bool {
        self.id.is_wildcard() || &self.id == id
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(3)?;
        writer.write_all(self.id.as_ref())?;
        writer.write_u8(self.pk_algo.into())?;
        for mpi in &self.mpis {
            mpi.to_writer(writer)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 8 + 1 + self.mpis.iter().map(Serialize::write_len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use chrono::{SubsecRound, Utc};

    use super::*;
    use crate::crypto::rsa::{generate_key, private_key_from_mpis};
    use crate::types::PlainSecretParams;

    fn rsa_pkey(public_params: crate::types::PublicParams) -> PublicKey {
        PublicKey::new(
            PublicKeyAlgorithm::RSA,
            Utc::now().trunc_subsecs(0),
            public_params,
        )
    }

    #[test]
    fn session_key_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (public_params, secret_params) = generate_key(&mut rng, 1024).unwrap();
        let PlainSecretParams::RSA { ref d, ref p, ref q, .. } = secret_params;
        let priv_key = private_key_from_mpis(&public_params, d, p, q).unwrap();
        let pkey = rsa_pkey(public_params);

        let alg = SymmetricKeyAlgorithm::AES256;
        let session_key = alg.new_session_key(&mut rng).unwrap();

        let pkesk =
            PublicKeyEncryptedSessionKey::from_session_key(&mut rng, &session_key, alg, &pkey)
                .unwrap();
        assert_eq!(pkesk.id(), &pkey.key_id());

        let buf = pkesk.to_bytes().unwrap();
        assert_eq!(buf.len(), pkesk.write_len());
        let back = PublicKeyEncryptedSessionKey::from_buf(&buf[..]).unwrap();
        assert_eq!(back, pkesk);

        let (dec_alg, dec_key) = back.decrypt(&priv_key).unwrap();
        assert_eq!(dec_alg, alg);
        assert_eq!(&dec_key[..], &session_key[..]);
    }

    #[test]
    fn wrong_key_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (public_params, _) = generate_key(&mut rng, 1024).unwrap();
        let pkey = rsa_pkey(public_params);

        let (other_public, other_secret) = generate_key(&mut rng, 1024).unwrap();
        let PlainSecretParams::RSA { ref d, ref p, ref q, .. } = other_secret;
        let other_priv = private_key_from_mpis(&other_public, d, p, q).unwrap();

        let alg = SymmetricKeyAlgorithm::AES128;
        let session_key = alg.new_session_key(&mut rng).unwrap();
        let pkesk =
            PublicKeyEncryptedSessionKey::from_session_key(&mut rng, &session_key, alg, &pkey)
                .unwrap();

        assert!(matches!(
            pkesk.decrypt(&other_priv).unwrap_err(),
            Error::DecryptionFailed
        ));
    }
}
