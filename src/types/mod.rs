mod compression;
mod fingerprint;
mod key_id;
mod mpi;
mod params;
mod password;
mod s2k;

pub use self::compression::CompressionAlgorithm;
pub use self::fingerprint::Fingerprint;
pub use self::key_id::KeyId;
pub use self::mpi::Mpi;
pub use self::params::{EncryptedSecretParams, PlainSecretParams, PublicParams, SecretParams};
pub use self::password::Password;
pub use self::s2k::{StringToKey, StringToKeyType};
