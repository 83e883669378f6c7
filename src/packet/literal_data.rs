use std::io;
use std::str;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::{ensure, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;

/// Literal Data Packet
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.9>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralData {
    mode: DataMode,
    file_name: Bytes,
    created: DateTime<Utc>,
    data: Bytes,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    Utf8 = b'u',

    #[num_enum(catch_all)]
    Other(u8),
}

impl LiteralData {
    /// Creates a literal data packet from the given bytes.
    pub fn from_bytes(file_name: impl Into<Bytes>, data: impl Into<Bytes>) -> Self {
        LiteralData {
            mode: DataMode::Binary,
            file_name: file_name.into(),
            created: Utc::now().trunc_subsecs(0),
            data: data.into(),
        }
    }

    /// Creates a literal data packet from the given string.
    pub fn from_str(file_name: impl Into<Bytes>, raw_data: &str) -> Self {
        LiteralData {
            mode: DataMode::Utf8,
            file_name: file_name.into(),
            created: Utc::now().trunc_subsecs(0),
            data: raw_data.as_bytes().to_vec().into(),
        }
    }

    /// Parses a `LiteralData` packet from the given buffer.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let mode = DataMode::from(i.read_u8()?);
        let name_len = i.read_u8()?;
        let file_name = i.read_take(name_len.into())?;
        let created = i.read_be_u32()?;
        let created = Utc
            .timestamp_opt(created.into(), 0)
            .single()
            .unwrap_or_default();
        let data = i.rest();

        Ok(LiteralData {
            mode,
            file_name,
            created,
            data,
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn file_name(&self) -> &Bytes {
        &self.file_name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// The data, as utf8 text. Fails for non utf8 content.
    pub fn to_string(&self) -> Result<String> {
        Ok(str::from_utf8(&self.data)?.to_string())
    }
}

impl Serialize for LiteralData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        ensure!(self.file_name.len() < 256, "file name too long");

        writer.write_u8(self.mode.into())?;
        writer.write_u8(self.file_name.len() as u8)?;
        writer.write_all(&self.file_name)?;
        writer.write_u32::<BigEndian>(self.created.timestamp().try_into()?)?;
        writer.write_all(&self.data)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + self.file_name.len() + 4 + self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let literal = LiteralData::from_str("hello.txt", "Hello, World!");
        let buf = literal.to_bytes().unwrap();
        assert_eq!(buf.len(), literal.write_len());

        let back = LiteralData::from_buf(&buf[..]).unwrap();
        assert_eq!(back, literal);
        assert_eq!(back.to_string().unwrap(), "Hello, World!");
    }

    #[test]
    fn binary_mode() {
        let literal = LiteralData::from_bytes("", vec![0u8, 159, 146, 150]);
        assert_eq!(literal.mode(), DataMode::Binary);
        assert!(literal.to_string().is_err());

        let back = LiteralData::from_buf(&literal.to_bytes().unwrap()[..]).unwrap();
        assert_eq!(back.data(), &[0u8, 159, 146, 150]);
    }
}
