pub mod checksum;
pub mod hash;
pub mod public_key;
pub mod rsa;
pub mod sym;

pub use self::hash::HashAlgorithm;
pub use self::public_key::PublicKeyAlgorithm;
pub use self::sym::SymmetricKeyAlgorithm;
