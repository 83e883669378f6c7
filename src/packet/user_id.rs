use std::fmt;
use std::io;
use std::str;

use bytes::Buf;

use crate::errors::{Error, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;

/// User ID Packet
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.11>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId {
    id: String,
}

impl UserId {
    /// Parses a `UserId` packet from the given buffer.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let body = i.rest();
        let id = str::from_utf8(&body)?.to_string();

        Ok(UserId { id })
    }

    pub fn from_str(id: &str) -> Self {
        UserId { id: id.to_string() }
    }

    /// Builds the conventional `Name <email>` form.
    ///
    /// At least one of the two parts must be given.
    pub fn from_parts(name: Option<&str>, email: Option<&str>) -> Result<Self> {
        let id = match (name, email) {
            (Some(name), Some(email)) => format!("{name} <{email}>"),
            (Some(name), None) => name.to_string(),
            (None, Some(email)) => format!("<{email}>"),
            (None, None) => {
                return Err(Error::InvalidKeyConfig {
                    message: "a user id requires a name or an email".to_string(),
                });
            }
        };

        Ok(UserId { id })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User ID: \"{}\"", self.id)
    }
}

impl Serialize for UserId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.id.as_bytes())?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.id.len()
    }
}
