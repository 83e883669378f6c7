use bytes::{Buf, Bytes, BytesMut};
use log::debug;

use crate::errors::{bail, Result};
use crate::packet::header::new_packet_length;
use crate::packet::{Packet, PacketHeader, PacketLength, Tag};
use crate::parsing::BufParsing;

/// Parses a sequence of packets from the given buffer.
///
/// Partial length bodies are assembled into a single body. Marker and
/// trust packets carry no message content and are dropped.
pub fn parse_packets<B: Buf>(mut i: B) -> Result<Vec<Packet>> {
    let mut packets = Vec::new();

    while i.has_remaining() {
        let header = PacketHeader::from_buf(&mut i)?;
        let body = read_packet_body(&header, &mut i)?;

        match header.tag() {
            Tag::Marker | Tag::Trust => {
                debug!("skipping {:?} packet", header.tag());
            }
            tag => {
                debug!("parsed {:?} packet, {} bytes", tag, body.len());
                packets.push(Packet::from_parts(tag, body)?);
            }
        }
    }

    Ok(packets)
}

fn read_packet_body<B: Buf>(header: &PacketHeader, i: &mut B) -> Result<Bytes> {
    match header.packet_length() {
        PacketLength::Fixed(len) => i.read_take(len),
        PacketLength::Indeterminate => Ok(i.rest()),
        PacketLength::Partial(len) => {
            // a partial chunk, followed by more length prefixed chunks,
            // ending with a fixed length one
            let mut out = BytesMut::new();
            out.extend_from_slice(&i.read_take(len)?);

            loop {
                match new_packet_length(i)? {
                    PacketLength::Fixed(len) => {
                        out.extend_from_slice(&i.read_take(len)?);
                        break;
                    }
                    PacketLength::Partial(len) => {
                        out.extend_from_slice(&i.read_take(len)?);
                    }
                    PacketLength::Indeterminate => {
                        bail!("invalid indeterminate length continuation");
                    }
                }
            }

            Ok(out.freeze())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::LiteralData;
    use crate::ser::Serialize;

    #[test]
    fn parse_serialized_packets() {
        let packets = vec![
            Packet::LiteralData(LiteralData::from_str("a.txt", "hello world")),
            Packet::UserId(crate::packet::UserId::from_str("Jon <jon@example.org>")),
        ];

        let mut buf = Vec::new();
        for packet in &packets {
            packet.to_writer(&mut buf).unwrap();
        }

        let back = parse_packets(&buf[..]).unwrap();
        assert_eq!(back, packets);
    }

    #[test]
    fn marker_packets_are_skipped() {
        // marker packet (tag 10) with the body "PGP", then a literal
        let mut buf = vec![0xCA, 0x03, b'P', b'G', b'P'];
        Packet::LiteralData(LiteralData::from_str("", "x"))
            .to_writer(&mut buf)
            .unwrap();

        let packets = parse_packets(&buf[..]).unwrap();
        assert_eq!(packets.len(), 1);
        assert!(matches!(packets[0], Packet::LiteralData(_)));
    }

    #[test]
    fn partial_lengths_are_assembled() {
        let literal = LiteralData::from_str("", "abcdefghijklmnop");
        let body = literal.to_bytes().unwrap();

        // new format header for tag 11 with a partial first chunk of 16
        // bytes, then a fixed tail
        let mut buf = vec![0xCB, 0xE4];
        buf.extend_from_slice(&body[..16]);
        let rest = &body[16..];
        assert!(rest.len() < 192);
        buf.push(rest.len() as u8);
        buf.extend_from_slice(rest);

        let packets = parse_packets(&buf[..]).unwrap();
        assert_eq!(packets, vec![Packet::LiteralData(literal)]);
    }

    #[test]
    fn truncated_input_fails() {
        let literal = LiteralData::from_str("a.txt", "hello");
        let buf = Packet::LiteralData(literal).to_bytes().unwrap();

        assert!(parse_packets(&buf[..buf.len() - 1]).is_err());
    }
}
