use pgpkit::composed::{
    KeyType, SecretKeyParamsBuilder, SignedSecretKey, StandaloneSignature,
};
use pgpkit::crypto::hash::HashAlgorithm;
use pgpkit::errors::Error;
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const PASSPHRASE: &str = "super long and hard to guess secret";

fn gen_key(rng: &mut ChaCha8Rng) -> SignedSecretKey {
    SecretKeyParamsBuilder::default()
        .key_type(KeyType::Rsa(2048))
        .primary_user_id("Jon Smith <jon.smith@example.org>".to_string())
        .passphrase(Some(PASSPHRASE.into()))
        .build()
        .expect("params")
        .generate(rng)
        .expect("generate")
        .sign(&PASSPHRASE.into())
        .expect("sign")
}

#[test]
fn detached_sign_and_verify() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let key = gen_key(&mut rng);
    let public = key.public_key();

    let signature = StandaloneSignature::sign(
        &key,
        &PASSPHRASE.into(),
        HashAlgorithm::Sha256,
        b"hello world",
    )
    .expect("sign");

    signature.verify(&public, b"hello world").expect("verify");
    assert!(signature.verify(&public, b"hello, world").is_err());
}

#[test]
fn detached_signature_armor_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let key = gen_key(&mut rng);
    let public = key.public_key();

    let signature = StandaloneSignature::sign(
        &key,
        &PASSPHRASE.into(),
        HashAlgorithm::Sha256,
        b"hello world",
    )
    .expect("sign");

    let armored = signature.to_armored_string(None).expect("armor");
    assert!(armored.starts_with("-----BEGIN PGP SIGNATURE-----"));

    let (back, _headers) = StandaloneSignature::from_string(&armored).expect("dearmor");
    assert_eq!(back, signature);
    back.verify(&public, b"hello world").expect("verify");
}

#[test]
fn signing_requires_the_passphrase() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let key = gen_key(&mut rng);

    assert!(matches!(
        StandaloneSignature::sign(&key, &"wrong".into(), HashAlgorithm::Sha256, b"data")
            .unwrap_err(),
        Error::WrongPassphrase
    ));
}

#[test]
fn verification_results_are_per_key() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let signer = gen_key(&mut rng);
    let other = gen_key(&mut rng);

    let signature = StandaloneSignature::sign(
        &signer,
        &PASSPHRASE.into(),
        HashAlgorithm::Sha256,
        b"hello world",
    )
    .expect("sign");

    let signer_public = signer.public_key();
    let other_public = other.public_key();
    let results = signature.verify_many(&[&signer_public, &other_public], b"hello world");

    assert_eq!(
        results,
        vec![(signer.key_id(), true), (other.key_id(), false)]
    );
}
