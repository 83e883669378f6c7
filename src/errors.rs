use std::num::TryFromIntError;

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error types
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid input"))]
    InvalidInput,
    #[snafu(display("malformed packet: {message}"))]
    MalformedPacket { message: String },
    #[snafu(display("packet body underrun: needed {needed}, remaining {remaining}"))]
    InsufficientData { needed: usize, remaining: usize },
    #[snafu(display("invalid armor wrappers"))]
    InvalidArmorWrappers,
    #[snafu(display("invalid crc24 checksum"))]
    InvalidChecksum,
    #[snafu(display("invalid key format"))]
    InvalidKeyFormat,
    #[snafu(display("invalid key config: {message}"))]
    InvalidKeyConfig { message: String },
    #[snafu(display("wrong passphrase"))]
    WrongPassphrase,
    #[snafu(display("decryption failed"))]
    DecryptionFailed,
    #[snafu(display("modification detection code mismatch"))]
    MdcError,
    #[snafu(display("no recipients or passwords supplied"))]
    NoRecipients,
    #[snafu(display("the random source did not provide enough entropy"))]
    InsufficientEntropy,
    #[snafu(display("cfb: invalid key iv length"))]
    CfbInvalidKeyIvLength,
    #[snafu(display("Unsupported: {message}"))]
    Unsupported { message: String },
    #[snafu(display("Not yet implemented: {message}"))]
    Unimplemented { message: String },
    #[snafu(display("{message}"))]
    Message { message: String },
    #[snafu(transparent)]
    RSAError { source: rsa::errors::Error },
    #[snafu(transparent)]
    IO { source: std::io::Error },
    #[snafu(transparent)]
    Base64Decode { source: base64::DecodeError },
    #[snafu(transparent)]
    Utf8Error { source: std::str::Utf8Error },
    #[snafu(transparent)]
    TryFromInt { source: TryFromIntError },
}

impl From<cipher::InvalidLength> for Error {
    fn from(_: cipher::InvalidLength) -> Error {
        Error::CfbInvalidKeyIvLength
    }
}

impl From<String> for Error {
    fn from(message: String) -> Error {
        Error::Message { message }
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Error {
        Error::InvalidKeyConfig {
            message: err.to_string(),
        }
    }
}

#[macro_export]
macro_rules! unimplemented_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unimplemented { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unimplemented { message: format!($fmt, $($arg)+)})
    };
}

#[macro_export]
macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported { message: $e.to_string()})
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported { message: format!($fmt, $($arg)+) })
    };
}

#[macro_export]
macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::Message { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Message { message: format!($fmt, $($arg)+) })
    };
}

#[macro_export]
macro_rules! format_err {
    ($e:expr) => {
        $crate::errors::Error::Message { message: $e.to_string() }
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::errors::Error::Message { message: format!($fmt, $($arg)+) }
    };
}

#[macro_export(local_inner_macros)]
macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            bail!($e);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            bail!($fmt, $($arg)+);
        }
    };
}

#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val)
                }
            }
        }
    });
    ($left:expr, $right:expr,) => ({
        ensure_eq!($left, $right)
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val,
                           format_args!($($arg)+))
                }
            }
        }
    });
}

pub use crate::{bail, ensure, ensure_eq, format_err, unimplemented_err, unsupported_err};
