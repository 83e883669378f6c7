use chrono::{DateTime, SubsecRound, Utc};
use derive_builder::Builder;
use rand::{CryptoRng, Rng};

use crate::composed::{KeyDetails, SecretKey};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{self, KeyFlags, UserId};
use crate::types::{Password, PlainSecretParams, PublicParams, SecretParams};

/// Parameters for generating a new secret key.
#[derive(Debug, PartialEq, Eq, Builder)]
#[builder(build_fn(validate = "Self::validate", error = "Error"))]
pub struct SecretKeyParams {
    key_type: KeyType,

    /// The primary user id, conventionally `Name <email>`.
    primary_user_id: String,
    #[builder(default)]
    user_ids: Vec<String>,

    #[builder(default)]
    passphrase: Option<Password>,

    #[builder(default = "Utc::now().trunc_subsecs(0)")]
    created_at: DateTime<Utc>,

    #[builder(default = "KeyFlags::certify_and_sign_and_encrypt()")]
    key_flags: KeyFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyType {
    /// Encryption & signing with RSA and the given bitsize.
    Rsa(u32),
}

impl KeyType {
    pub fn to_alg(&self) -> PublicKeyAlgorithm {
        match self {
            KeyType::Rsa(_) => PublicKeyAlgorithm::RSA,
        }
    }

    pub fn generate<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<(PublicParams, PlainSecretParams)> {
        match self {
            KeyType::Rsa(bit_size) => crate::crypto::rsa::generate_key(rng, *bit_size as usize),
        }
    }
}

impl SecretKeyParamsBuilder {
    fn validate(&self) -> std::result::Result<(), Error> {
        match &self.key_type {
            Some(KeyType::Rsa(size)) => {
                if *size < 2048 {
                    return Err(Error::InvalidKeyConfig {
                        message: "keys with less than 2048 bits are considered insecure"
                            .to_string(),
                    });
                }
            }
            None => {}
        }

        if let Some(id) = &self.primary_user_id {
            if id.is_empty() {
                return Err(Error::InvalidKeyConfig {
                    message: "the primary user id must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn user_id<VALUE: Into<String>>(&mut self, value: VALUE) -> &mut Self {
        if let Some(ref mut user_ids) = self.user_ids {
            user_ids.push(value.into());
        } else {
            self.user_ids = Some(vec![value.into()]);
        }
        self
    }
}

impl SecretKeyParams {
    /// Generate a new, not yet self signed, secret key.
    pub fn generate<R: Rng + CryptoRng>(self, rng: &mut R) -> Result<SecretKey> {
        let (public_params, secret_params) = self.key_type.generate(rng)?;

        let mut primary_key = packet::SecretKey::new(
            packet::PublicKey::new(self.key_type.to_alg(), self.created_at, public_params),
            SecretParams::Plain(secret_params),
        );
        if let Some(passphrase) = &self.passphrase {
            primary_key.set_passphrase(rng, passphrase)?;
        }

        let mut user_ids = vec![UserId::from_str(&self.primary_user_id)];
        user_ids.extend(self.user_ids.iter().map(|id| UserId::from_str(id)));

        Ok(SecretKey::new(
            primary_key,
            KeyDetails::new(user_ids, self.key_flags),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_keys_are_rejected() {
        let res = SecretKeyParamsBuilder::default()
            .key_type(KeyType::Rsa(1024))
            .primary_user_id("Jon <jon@example.org>".to_string())
            .build();
        assert!(matches!(res, Err(Error::InvalidKeyConfig { .. })));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let res = SecretKeyParamsBuilder::default()
            .key_type(KeyType::Rsa(2048))
            .build();
        assert!(matches!(res, Err(Error::InvalidKeyConfig { .. })));

        let res = SecretKeyParamsBuilder::default()
            .key_type(KeyType::Rsa(2048))
            .primary_user_id(String::new())
            .build();
        assert!(matches!(res, Err(Error::InvalidKeyConfig { .. })));
    }
}
