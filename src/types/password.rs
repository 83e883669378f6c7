use std::fmt;

use zeroize::Zeroizing;

/// A passphrase, zeroed from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Zeroizing<Vec<u8>>);

impl Password {
    /// The empty password, used for keys without passphrase protection.
    pub fn empty() -> Self {
        Password(Zeroizing::new(Vec::new()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Password {
    fn from(pw: &str) -> Self {
        Password(Zeroizing::new(pw.as_bytes().to_vec()))
    }
}

impl From<String> for Password {
    fn from(pw: String) -> Self {
        Password(Zeroizing::new(pw.into_bytes()))
    }
}

impl From<&[u8]> for Password {
    fn from(pw: &[u8]) -> Self {
        Password(Zeroizing::new(pw.to_vec()))
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(..)")
    }
}
