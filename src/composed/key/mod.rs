mod builder;
mod public;
mod secret;
mod shared;

pub use self::builder::{KeyType, SecretKeyParams, SecretKeyParamsBuilder};
pub use self::public::{SignedPublicKey, SignedPublicSubkey};
pub use self::secret::{SecretKey, SignedSecretKey, SignedSecretSubkey};
pub use self::shared::{KeyDetails, SignedKeyDetails, SignedUser};
