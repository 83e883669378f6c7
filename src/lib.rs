//! # pgpkit
//!
//! OpenPGP (RFC 4880) message processing: key generation, encryption,
//! decryption, signing and verification, with ASCII armor on the outside.
//!
//! ```rust
//! use pgpkit::composed::{KeyType, Message, SecretKeyParamsBuilder};
//! use pgpkit::crypto::sym::SymmetricKeyAlgorithm;
//! use pgpkit::types::Password;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! # fn main() -> pgpkit::errors::Result<()> {
//! let mut rng = ChaCha8Rng::seed_from_u64(0);
//!
//! let key = SecretKeyParamsBuilder::default()
//!     .key_type(KeyType::Rsa(2048))
//!     .primary_user_id("Alice <alice@example.org>".to_string())
//!     .build()?
//!     .generate(&mut rng)?
//!     .sign(&Password::empty())?;
//!
//! let message = Message::new_literal("", "Hello, World!");
//! let encrypted = message.encrypt_to_keys(
//!     &mut rng,
//!     SymmetricKeyAlgorithm::AES256,
//!     &[&key.public_key()],
//! )?;
//!
//! let decrypted = encrypted.decrypt(&Password::empty(), &[&key])?;
//! assert_eq!(decrypted.get_content()?.unwrap(), b"Hello, World!");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::unwrap_used, rust_2018_idioms)]

pub mod armor;
pub mod composed;
pub mod crypto;
pub mod errors;
pub mod packet;
mod parsing;
pub mod ser;
pub mod types;

pub use crate::composed::{
    Message, SecretKeyParamsBuilder, SignedPublicKey, SignedSecretKey, StandaloneSignature,
};
