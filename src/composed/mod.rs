mod key;
mod message;
mod signature;

pub use self::key::{
    KeyDetails, KeyType, SecretKey, SecretKeyParams, SecretKeyParamsBuilder, SignedKeyDetails,
    SignedPublicKey, SignedPublicSubkey, SignedSecretKey, SignedSecretSubkey, SignedUser,
};
pub use self::message::{Esk, Message, SignatureVerification};
pub use self::signature::StandaloneSignature;
