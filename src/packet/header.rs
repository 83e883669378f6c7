use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;

use crate::errors::{bail, Error, Result};
use crate::packet::Tag;
use crate::parsing::BufParsing;
use crate::ser::Serialize;

/// Maximum size of a partial packet chunk.
const MAX_PARTIAL_LEN: usize = 1 << 30;

/// The two framing styles a packet header can use.
///
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-4.2>
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PacketHeaderVersion {
    /// Old format ("legacy format"), tags 0..=15 only.
    Old,
    /// New format ("OpenPGP format").
    New,
}

/// The length of a packet body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PacketLength {
    Fixed(usize),
    /// Old format packets without a length run to the end of the input.
    Indeterminate,
    /// First chunk of a partial length body, always a power of two.
    Partial(usize),
}

/// A parsed packet header: framing style, tag and body length.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    version: PacketHeaderVersion,
    tag: Tag,
    length: PacketLength,
}

impl PacketHeader {
    /// Parse a single packet header from the given buffer.
    pub fn from_buf<B: Buf>(i: &mut B) -> Result<Self> {
        let header = i.read_u8()?;

        if header & 0b1000_0000 == 0 {
            return Err(Error::MalformedPacket {
                message: format!("invalid packet header {header:b}"),
            });
        }

        if header & 0b0100_0000 != 0 {
            // new format, the tag is the lower six bits
            let tag = Tag::from(header & 0b0011_1111);
            let length = new_packet_length(i)?;

            Ok(PacketHeader {
                version: PacketHeaderVersion::New,
                tag,
                length,
            })
        } else {
            // old format, four bits of tag and two bits of length type
            let tag = Tag::from((header & 0b0011_1100) >> 2);
            let length = match header & 0b0000_0011 {
                0 => PacketLength::Fixed(i.read_u8()?.into()),
                1 => PacketLength::Fixed(i.read_be_u16()?.into()),
                2 => PacketLength::Fixed(i.read_be_u32()?.try_into()?),
                3 => PacketLength::Indeterminate,
                _ => unreachable!("old packet length type is only 2 bits"),
            };

            Ok(PacketHeader {
                version: PacketHeaderVersion::Old,
                tag,
                length,
            })
        }
    }

    /// Creates a new format header with a fixed length.
    ///
    /// This is the only form the serializer emits.
    pub fn new_fixed(tag: Tag, length: usize) -> Self {
        PacketHeader {
            version: PacketHeaderVersion::New,
            tag,
            length: PacketLength::Fixed(length),
        }
    }

    pub fn version(&self) -> PacketHeaderVersion {
        self.version
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn packet_length(&self) -> PacketLength {
        self.length
    }
}

/// Parses a new format body length, used both in headers and for the
/// continuation chunks of partial length bodies.
pub(crate) fn new_packet_length<B: Buf>(i: &mut B) -> Result<PacketLength> {
    let olen = i.read_u8()?;
    let length = match olen {
        // One-Octet Lengths
        0..=191 => PacketLength::Fixed(olen.into()),
        // Two-Octet Lengths
        192..=223 => {
            let a = i.read_u8()?;
            PacketLength::Fixed(((olen as usize - 192) << 8) + 192 + a as usize)
        }
        // Partial Body Lengths
        224..=254 => {
            let len = 1usize << (olen & 0x1F);
            if len > MAX_PARTIAL_LEN {
                return Err(Error::InvalidInput);
            }
            PacketLength::Partial(len)
        }
        // Five-Octet Lengths
        255 => PacketLength::Fixed(i.read_be_u32()?.try_into()?),
    };
    Ok(length)
}

impl Serialize for PacketHeader {
    fn to_writer<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        // only new format fixed lengths are ever written out
        let PacketLength::Fixed(len) = self.length else {
            bail!("only fixed length headers can be serialized");
        };

        writer.write_u8(0b1100_0000 | u8::from(self.tag))?;

        if len < 192 {
            writer.write_u8(len as u8)?;
        } else if len < 8384 {
            writer.write_u8((((len - 192) >> 8) + 192) as u8)?;
            writer.write_u8(((len - 192) & 0xFF) as u8)?;
        } else {
            writer.write_u8(255)?;
            writer.write_u32::<BigEndian>(len.try_into()?)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        let PacketLength::Fixed(len) = self.length else {
            return 1;
        };

        if len < 192 {
            2
        } else if len < 8384 {
            3
        } else {
            6
        }
    }
}
