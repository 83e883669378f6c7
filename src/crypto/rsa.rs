use log::debug;
use num_bigint::{BigUint, ModInverse};
use rand::{CryptoRng, Rng};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{bail, ensure_eq, format_err, unsupported_err, Result};
use crate::types::{Mpi, PlainSecretParams, PublicParams};

/// Maps an OpenPGP hash algorithm to the PKCS#1 v1.5 scheme carrying its
/// DigestInfo prefix.
fn signing_scheme(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    let scheme = match hash {
        HashAlgorithm::Md5 => Pkcs1v15Sign::new::<md5::Md5>(),
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        _ => unsupported_err!("signature hash algorithm {:?}", hash),
    };
    Ok(scheme)
}

/// MPIs strip leading zeros, PKCS#1 wants exactly the modulus width back.
fn left_pad(data: &[u8], size: usize) -> Vec<u8> {
    if data.len() >= size {
        return data.to_vec();
    }
    let mut out = vec![0u8; size];
    out[size - data.len()..].copy_from_slice(data);
    out
}

/// Build the crate internal private key representation.
pub fn private_key_from_mpis(
    public_params: &PublicParams,
    d: &Mpi,
    p: &Mpi,
    q: &Mpi,
) -> Result<RsaPrivateKey> {
    let PublicParams::RSA { n, e } = public_params;

    let key = RsaPrivateKey::from_components(
        BigUint::from_bytes_be(n.as_ref()),
        BigUint::from_bytes_be(e.as_ref()),
        BigUint::from_bytes_be(d.as_ref()),
        vec![
            BigUint::from_bytes_be(p.as_ref()),
            BigUint::from_bytes_be(q.as_ref()),
        ],
    )?;
    key.validate()?;

    Ok(key)
}

/// RSA encryption using PKCS1v15 padding.
pub fn encrypt<R: CryptoRng + Rng>(
    rng: &mut R,
    n: &[u8],
    e: &[u8],
    plaintext: &[u8],
) -> Result<Vec<Mpi>> {
    debug!("RSA encrypt");

    let key = RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))?;
    let data = key.encrypt(rng, Pkcs1v15Encrypt, plaintext)?;

    Ok(vec![Mpi::from_slice(&data)])
}

/// RSA decryption using PKCS1v15 padding.
pub fn decrypt(priv_key: &RsaPrivateKey, mpis: &[Mpi]) -> Result<Vec<u8>> {
    debug!("RSA decrypt");

    // rsa consists of exactly one mpi
    ensure_eq!(mpis.len(), 1, "invalid amount of rsa encryption mpis");

    let ciphertext = left_pad(mpis[0].as_ref(), priv_key.size());
    let m = priv_key.decrypt(Pkcs1v15Encrypt, &ciphertext)?;

    Ok(m)
}

/// Sign using RSA, with PKCS1v15 padding.
pub fn sign(priv_key: &RsaPrivateKey, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<Mpi>> {
    let sig = priv_key.sign(signing_scheme(hash)?, digest)?;

    Ok(vec![Mpi::from_slice(&sig)])
}

/// Verify a RSA, PKCS1v15 padded signature.
pub fn verify(n: &[u8], e: &[u8], hash: HashAlgorithm, hashed: &[u8], sig: &[u8]) -> Result<()> {
    let key = RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))?;
    let sig = left_pad(sig, key.size());

    key.verify(signing_scheme(hash)?, hashed, &sig)
        .map_err(Into::into)
}

/// Generate an RSA key pair.
pub fn generate_key<R: Rng + CryptoRng>(
    rng: &mut R,
    bit_size: usize,
) -> Result<(PublicParams, PlainSecretParams)> {
    debug!("generating {bit_size} bit RSA key");

    let key = RsaPrivateKey::new(rng, bit_size)?;

    let p = &key.primes()[0];
    let q = &key.primes()[1];
    let u = p
        .clone()
        .mod_inverse(q)
        .and_then(|u| u.to_biguint())
        .ok_or_else(|| format_err!("invalid primes generated"))?;

    Ok((
        PublicParams::RSA {
            n: key.n().into(),
            e: key.e().into(),
        },
        PlainSecretParams::RSA {
            d: key.d().into(),
            p: p.into(),
            q: q.into(),
            u: u.into(),
        },
    ))
}
