//! ASCII Armor according to RFC 4880 Section 6.
//!
//! Textual encapsulation of binary OpenPGP data: `BEGIN`/`END` markers,
//! optional headers, base64 body and a CRC-24 checksum line.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hasher;
use std::io::Write;

use base64::engine::{general_purpose::STANDARD, Engine as _};
use crc24::Crc24Hasher;

use crate::errors::{Error, Result};
use crate::ser::Serialize;

/// Armor Headers.
pub type Headers = BTreeMap<String, String>;

/// Width of the base64 body lines.
const ARMOR_COLUMNS: usize = 64;

/// Armor block types.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BlockType {
    /// PGP public key
    PublicKey,
    /// PGP private key
    PrivateKey,
    Message,
    Signature,
    /// Cleartext framework message
    CleartextMessage,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::PublicKey => f.write_str("PGP PUBLIC KEY BLOCK"),
            BlockType::PrivateKey => f.write_str("PGP PRIVATE KEY BLOCK"),
            BlockType::Message => f.write_str("PGP MESSAGE"),
            BlockType::Signature => f.write_str("PGP SIGNATURE"),
            BlockType::CleartextMessage => f.write_str("PGP SIGNED MESSAGE"),
        }
    }
}

impl BlockType {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "PGP PUBLIC KEY BLOCK" => Some(BlockType::PublicKey),
            "PGP PRIVATE KEY BLOCK" => Some(BlockType::PrivateKey),
            "PGP MESSAGE" => Some(BlockType::Message),
            "PGP SIGNATURE" => Some(BlockType::Signature),
            "PGP SIGNED MESSAGE" => Some(BlockType::CleartextMessage),
            _ => None,
        }
    }
}

fn crc24(data: &[u8]) -> u32 {
    let mut hasher = Crc24Hasher::new();
    hasher.write(data);
    hasher.finish() as u32
}

fn crc24_bytes(crc: u32) -> [u8; 3] {
    [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8]
}

/// Armor the given source into `writer`.
pub fn write(
    source: &impl Serialize,
    typ: BlockType,
    writer: &mut impl Write,
    headers: Option<&Headers>,
    include_checksum: bool,
) -> Result<()> {
    let body = source.to_bytes()?;

    // armor header
    writer.write_all(b"-----BEGIN ")?;
    write!(writer, "{typ}")?;
    writer.write_all(b"-----\n")?;

    // armor headers
    if let Some(headers) = headers {
        for (key, value) in headers.iter() {
            writer.write_all(key.as_bytes())?;
            writer.write_all(b": ")?;
            writer.write_all(value.as_bytes())?;
            writer.write_all(b"\n")?;
        }
    }

    writer.write_all(b"\n")?;

    // base64 body, wrapped at 64 columns
    let encoded = STANDARD.encode(&body);
    for chunk in encoded.as_bytes().chunks(ARMOR_COLUMNS) {
        writer.write_all(chunk)?;
        writer.write_all(b"\n")?;
    }

    if include_checksum {
        let crc_enc = STANDARD.encode(crc24_bytes(crc24(&body)));
        writer.write_all(b"=")?;
        writer.write_all(crc_enc.as_bytes())?;
        writer.write_all(b"\n")?;
    }

    // footer
    writer.write_all(b"-----END ")?;
    write!(writer, "{typ}")?;
    writer.write_all(b"-----\n")?;

    Ok(())
}

/// Armor the given source into a `String`.
pub fn to_armored_string(
    source: &impl Serialize,
    typ: BlockType,
    headers: Option<&Headers>,
) -> Result<String> {
    let mut buf = Vec::new();
    write(source, typ, &mut buf, headers, true)?;
    Ok(std::str::from_utf8(&buf)?.to_string())
}

fn parse_begin_line(line: &str) -> Result<BlockType> {
    let label = line
        .strip_prefix("-----BEGIN ")
        .and_then(|rest| rest.strip_suffix("-----"))
        .ok_or(Error::InvalidArmorWrappers)?;
    BlockType::from_label(label).ok_or(Error::InvalidArmorWrappers)
}

fn parse_end_line(line: &str) -> Result<BlockType> {
    let label = line
        .strip_prefix("-----END ")
        .and_then(|rest| rest.strip_suffix("-----"))
        .ok_or(Error::InvalidArmorWrappers)?;
    BlockType::from_label(label).ok_or(Error::InvalidArmorWrappers)
}

/// Decode an armored block back into its binary form.
///
/// Returns the block type, the armor headers and the decoded bytes.
/// A missing checksum line is accepted, a present one must match.
pub fn dearmor(input: &str) -> Result<(BlockType, Headers, Vec<u8>)> {
    let mut lines = input.lines().map(|l| l.trim_end_matches('\r'));

    // skip anything before the BEGIN marker
    let begin = lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .ok_or(Error::InvalidArmorWrappers)?;
    let typ = parse_begin_line(begin.trim())?;

    let mut headers = Headers::new();
    let mut body64 = String::new();
    let mut checksum = None;
    let mut end_typ = None;
    let mut in_headers = true;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            in_headers = false;
            continue;
        }
        if line.starts_with("-----END ") {
            end_typ = Some(parse_end_line(line)?);
            break;
        }
        if in_headers {
            if let Some((key, value)) = line.split_once(": ") {
                headers.insert(key.to_string(), value.to_string());
                continue;
            }
            in_headers = false;
        }
        if let Some(crc_line) = line.strip_prefix('=') {
            // four base64 chars encoding the 3 crc bytes
            if crc_line.len() == 4 {
                let raw = STANDARD.decode(crc_line)?;
                checksum = Some(
                    (u32::from(raw[0]) << 16) | (u32::from(raw[1]) << 8) | u32::from(raw[2]),
                );
                continue;
            }
        }
        body64.push_str(line);
    }

    match end_typ {
        Some(end) if end == typ => {}
        _ => return Err(Error::InvalidArmorWrappers),
    }

    let body = STANDARD.decode(body64.as_bytes())?;

    if let Some(expected) = checksum {
        if crc24(&body) != expected {
            return Err(Error::InvalidChecksum);
        }
    }

    Ok((typ, headers, body))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    struct TestSource(Vec<u8>);

    impl Serialize for TestSource {
        fn to_writer<W: std::io::Write>(&self, w: &mut W) -> Result<()> {
            w.write_all(&self.0)?;
            Ok(())
        }

        fn write_len(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn armor_layout() {
        let source = TestSource(vec![0xAB; 100]);
        let armored = to_armored_string(&source, BlockType::Message, None).unwrap();
        let lines: Vec<_> = armored.lines().collect();

        assert_eq!(lines[0], "-----BEGIN PGP MESSAGE-----");
        assert_eq!(lines[1], "");
        assert!(lines[2].len() <= 64);
        assert_eq!(lines[lines.len() - 2].len(), 5, "checksum line");
        assert!(lines[lines.len() - 2].starts_with('='));
        assert_eq!(lines[lines.len() - 1], "-----END PGP MESSAGE-----");
    }

    #[test]
    fn dearmor_empty_body() {
        for typ in [
            BlockType::Message,
            BlockType::PublicKey,
            BlockType::PrivateKey,
            BlockType::Signature,
        ] {
            let armored = to_armored_string(&TestSource(vec![]), typ, None).unwrap();
            let (typ_back, _headers, data) = dearmor(&armored).unwrap();
            assert_eq!(typ_back, typ);
            assert!(data.is_empty());
        }
    }

    #[test]
    fn dearmor_headers() {
        let mut headers = Headers::new();
        headers.insert("Comment".to_string(), "hello".to_string());
        headers.insert("Version".to_string(), "pgpkit".to_string());

        let armored =
            to_armored_string(&TestSource(b"data".to_vec()), BlockType::Message, Some(&headers))
                .unwrap();
        let (_, headers_back, data) = dearmor(&armored).unwrap();
        assert_eq!(headers_back, headers);
        assert_eq!(data, b"data");
    }

    #[test]
    fn dearmor_detects_bad_checksum() {
        let armored =
            to_armored_string(&TestSource(b"hello world".to_vec()), BlockType::Message, None)
                .unwrap();

        // flip one character of the base64 body, keep the checksum line
        let mut lines: Vec<String> = armored.lines().map(str::to_string).collect();
        assert_eq!(lines[2], "aGVsbG8gd29ybGQ=");
        lines[2].replace_range(0..1, "b");
        let corrupted = lines.join("\n");

        assert!(matches!(
            dearmor(&corrupted).unwrap_err(),
            Error::InvalidChecksum
        ));
    }

    #[test]
    fn dearmor_detects_bad_wrappers() {
        let armored =
            to_armored_string(&TestSource(b"hi".to_vec()), BlockType::Message, None).unwrap();

        let wrong_end = armored.replace("END PGP MESSAGE", "END PGP SIGNATURE");
        assert!(matches!(
            dearmor(&wrong_end).unwrap_err(),
            Error::InvalidArmorWrappers
        ));

        let no_begin = armored.replace("BEGIN", "BEGN");
        assert!(matches!(
            dearmor(&no_begin).unwrap_err(),
            Error::InvalidArmorWrappers
        ));
    }

    #[test]
    fn missing_checksum_line_is_accepted() {
        let mut buf = Vec::new();
        write(
            &TestSource(b"some data".to_vec()),
            BlockType::Message,
            &mut buf,
            None,
            false,
        )
        .unwrap();
        let armored = String::from_utf8(buf).unwrap();
        let (_, _, data) = dearmor(&armored).unwrap();
        assert_eq!(data, b"some data");
    }

    proptest! {
        #[test]
        fn armor_roundtrip(data: Vec<u8>) {
            let armored = to_armored_string(&TestSource(data.clone()), BlockType::Message, None)?;
            let (typ, _, back) = dearmor(&armored)?;
            prop_assert_eq!(typ, BlockType::Message);
            prop_assert_eq!(back, data);
        }
    }
}
