use num_enum::{FromPrimitive, IntoPrimitive};

/// Available public key algorithms.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-9.1>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PublicKeyAlgorithm {
    /// RSA (Encrypt and Sign)
    RSA = 1,
    /// DEPRECATED: RSA (Encrypt-Only)
    RSAEncrypt = 2,
    /// DEPRECATED: RSA (Sign-Only)
    RSASign = 3,
    /// Elgamal (Encrypt-Only)
    Elgamal = 16,
    DSA = 17,
    ECDH = 18,
    ECDSA = 19,
    /// DEPRECATED: Elgamal (Encrypt and Sign)
    ElgamalEncryptSign = 20,
    EdDSALegacy = 22,

    #[num_enum(catch_all)]
    Other(u8),
}

impl PublicKeyAlgorithm {
    /// Can this algorithm be used for encryption?
    pub fn can_encrypt(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA
                | PublicKeyAlgorithm::RSAEncrypt
                | PublicKeyAlgorithm::Elgamal
                | PublicKeyAlgorithm::ECDH
        )
    }

    /// Can this algorithm be used for signing?
    pub fn can_sign(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA
                | PublicKeyAlgorithm::RSASign
                | PublicKeyAlgorithm::DSA
                | PublicKeyAlgorithm::ECDSA
                | PublicKeyAlgorithm::EdDSALegacy
        )
    }
}
