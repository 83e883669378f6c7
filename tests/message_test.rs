use pgpkit::composed::{KeyType, Message, SecretKeyParamsBuilder, SignedSecretKey};
use pgpkit::crypto::hash::HashAlgorithm;
use pgpkit::crypto::sym::SymmetricKeyAlgorithm;
use pgpkit::errors::Error;
use pgpkit::types::{CompressionAlgorithm, Password};
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
fn encrypt_decrypt_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let key = gen_key(&mut rng);
    let public = key.public_key();

    let message = Message::new_literal("", "Hello, World!");
    let encrypted = message
        .encrypt_to_keys(&mut rng, SymmetricKeyAlgorithm::AES128, &[&public])
        .expect("encrypt");

    let armored = encrypted.to_armored_string(None).expect("armor");
    assert!(armored.starts_with("-----BEGIN PGP MESSAGE-----"));

    let (back, _headers) = Message::from_string(&armored).expect("dearmor");
    assert_eq!(back, encrypted);
    assert_eq!(back.get_content().expect("content"), None);

    let decrypted = back
        .decrypt(&PASSPHRASE.into(), &[&key])
        .expect("decrypt");
    assert_eq!(
        decrypted.get_content().expect("content").expect("literal"),
        b"Hello, World!"
    );

    assert!(matches!(
        back.decrypt(&"wrong".into(), &[&key]).unwrap_err(),
        Error::WrongPassphrase
    ));
}

#[test]
fn compressed_encrypt_decrypt() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let key = gen_key(&mut rng);
    let public = key.public_key();

    let message = Message::new_literal("notes.txt", &"all work and no play\n".repeat(40));
    let encrypted = message
        .compress(CompressionAlgorithm::ZLIB)
        .expect("compress")
        .encrypt_to_keys(&mut rng, SymmetricKeyAlgorithm::AES256, &[&public])
        .expect("encrypt");

    let decrypted = encrypted
        .decrypt(&PASSPHRASE.into(), &[&key])
        .expect("decrypt");
    assert_eq!(
        decrypted.get_content().expect("content").expect("literal"),
        message.get_content().expect("content").expect("literal")
    );
}

#[test]
fn sign_and_verify_message() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let key = gen_key(&mut rng);
    let public = key.public_key();

    let message = Message::new_literal("", "hello world");
    let signed = message
        .sign(&key, &PASSPHRASE.into(), HashAlgorithm::Sha256)
        .expect("sign");
    signed.verify(&public).expect("verify");

    // signed messages survive serialization
    let armored = signed.to_armored_string(None).expect("armor");
    let (back, _headers) = Message::from_string(&armored).expect("dearmor");
    assert_eq!(back, signed);
    back.verify(&public).expect("verify");
    assert_eq!(
        back.get_content().expect("content").expect("literal"),
        b"hello world"
    );
}

#[test]
fn verification_results_are_per_key() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let signer = gen_key(&mut rng);
    let other = gen_key(&mut rng);

    let signed = Message::new_literal("", "hello world")
        .sign(&signer, &PASSPHRASE.into(), HashAlgorithm::Sha256)
        .expect("sign");

    let signer_public = signer.public_key();
    let other_public = other.public_key();
    let results = signed.verify_many(&[&other_public, &signer_public]);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].key_id, other.key_id());
    assert!(!results[0].valid);
    assert_eq!(results[1].key_id, signer.key_id());
    assert!(results[1].valid);
}

#[test]
fn sign_then_encrypt_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let key = gen_key(&mut rng);
    let public = key.public_key();

    let encrypted = Message::new_literal("", "Hello, World!")
        .sign(&key, &PASSPHRASE.into(), HashAlgorithm::Sha256)
        .expect("sign")
        .encrypt(
            &mut rng,
            SymmetricKeyAlgorithm::AES256,
            &[&public],
            &[Password::from("shared word")],
        )
        .expect("encrypt");

    // both credentials recover the same signed message
    let via_key = encrypted
        .decrypt(&PASSPHRASE.into(), &[&key])
        .expect("decrypt with key");
    let via_password = encrypted
        .decrypt_with_password(&"shared word".into())
        .expect("decrypt with password");
    assert_eq!(via_key, via_password);

    via_key.verify(&public).expect("verify");
    assert_eq!(
        via_key.get_content().expect("content").expect("literal"),
        b"Hello, World!"
    );
}

#[test]
fn any_password_of_many_decrypts() {
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let message = Message::new_literal("", "group secret");

    let encrypted = message
        .encrypt(
            &mut rng,
            SymmetricKeyAlgorithm::AES128,
            &[],
            &[
                Password::from("first password"),
                Password::from("second password"),
            ],
        )
        .expect("encrypt");

    for password in ["first password", "second password"] {
        let decrypted = encrypted
            .decrypt_with_password(&password.into())
            .expect("decrypt");
        assert_eq!(decrypted, message);
    }

    assert!(matches!(
        encrypted
            .decrypt_with_password(&"third password".into())
            .unwrap_err(),
        Error::DecryptionFailed
    ));
}

#[test]
fn any_recipient_key_decrypts() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let first = gen_key(&mut rng);
    let second = gen_key(&mut rng);

    let encrypted = Message::new_literal("", "for both of you")
        .encrypt_to_keys(
            &mut rng,
            SymmetricKeyAlgorithm::AES128,
            &[&first.public_key(), &second.public_key()],
        )
        .expect("encrypt");

    for key in [&first, &second] {
        let decrypted = encrypted
            .decrypt(&PASSPHRASE.into(), &[key])
            .expect("decrypt");
        assert_eq!(
            decrypted.get_content().expect("content").expect("literal"),
            b"for both of you"
        );
    }
}

#[test]
fn tampered_ciphertext_is_rejected() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let key = gen_key(&mut rng);
    let public = key.public_key();

    let encrypted = Message::new_literal("", "payload")
        .encrypt_to_keys(&mut rng, SymmetricKeyAlgorithm::AES128, &[&public])
        .expect("encrypt");

    let mut raw = pgpkit::ser::Serialize::to_bytes(&encrypted).expect("serialize");
    let last = raw.len() - 1;
    raw[last] ^= 0x01;

    let tampered = Message::from_bytes(&raw[..]).expect("parse");
    assert!(matches!(
        tampered.decrypt(&PASSPHRASE.into(), &[&key]).unwrap_err(),
        Error::MdcError | Error::DecryptionFailed
    ));
}
