use std::io::{self, Read, Write};

use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use log::debug;

use crate::errors::{ensure, unsupported_err, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::CompressionAlgorithm;

/// Decompressed data is capped at 1 GiB to guard against decompression bombs.
const MAX_DECOMPRESSED_SIZE: u64 = 1024 * 1024 * 1024;

/// Compressed Data Packet
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.6>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedData {
    algorithm: CompressionAlgorithm,
    compressed_data: Bytes,
}

impl CompressedData {
    /// Parses a `CompressedData` packet from the given buffer.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let algorithm = CompressionAlgorithm::from(i.read_u8()?);
        let compressed_data = i.rest();

        Ok(CompressedData {
            algorithm,
            compressed_data,
        })
    }

    /// Compresses the given data.
    pub fn compress(algorithm: CompressionAlgorithm, data: &[u8]) -> Result<Self> {
        debug!("compressing {} bytes using {:?}", data.len(), algorithm);

        let compressed_data = match algorithm {
            CompressionAlgorithm::Uncompressed => data.to_vec(),
            CompressionAlgorithm::ZIP => {
                let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
                enc.write_all(data)?;
                enc.finish()?
            }
            CompressionAlgorithm::ZLIB => {
                let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
                enc.write_all(data)?;
                enc.finish()?
            }
            _ => unsupported_err!("compression algorithm {:?}", algorithm),
        };

        Ok(CompressedData {
            algorithm,
            compressed_data: compressed_data.into(),
        })
    }

    /// Decompresses the contained data.
    pub fn decompress(&self) -> Result<Bytes> {
        debug!(
            "decompressing {} bytes using {:?}",
            self.compressed_data.len(),
            self.algorithm
        );

        let mut out = Vec::new();
        match self.algorithm {
            CompressionAlgorithm::Uncompressed => {
                out.extend_from_slice(&self.compressed_data);
            }
            CompressionAlgorithm::ZIP => {
                DeflateDecoder::new(&self.compressed_data[..])
                    .take(MAX_DECOMPRESSED_SIZE + 1)
                    .read_to_end(&mut out)?;
            }
            CompressionAlgorithm::ZLIB => {
                ZlibDecoder::new(&self.compressed_data[..])
                    .take(MAX_DECOMPRESSED_SIZE + 1)
                    .read_to_end(&mut out)?;
            }
            _ => unsupported_err!("compression algorithm {:?}", self.algorithm),
        }
        ensure!(
            out.len() as u64 <= MAX_DECOMPRESSED_SIZE,
            "decompressed data too large"
        );

        Ok(out.into())
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }
}

impl Serialize for CompressedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.algorithm.into())?;
        writer.write_all(&self.compressed_data)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.compressed_data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_roundtrip() {
        let data = b"hello hello hello hello hello".repeat(10);
        let compressed = CompressedData::compress(CompressionAlgorithm::ZLIB, &data).unwrap();
        assert!(compressed.write_len() < data.len());

        let buf = compressed.to_bytes().unwrap();
        let back = CompressedData::from_buf(&buf[..]).unwrap();
        assert_eq!(back, compressed);
        assert_eq!(&back.decompress().unwrap()[..], &data[..]);
    }

    #[test]
    fn zip_roundtrip() {
        let data = b"some literal content";
        let compressed = CompressedData::compress(CompressionAlgorithm::ZIP, data).unwrap();
        assert_eq!(&compressed.decompress().unwrap()[..], &data[..]);
    }

    #[test]
    fn unsupported_algorithm() {
        assert!(CompressedData::compress(CompressionAlgorithm::BZip2, b"data").is_err());

        let packet = CompressedData {
            algorithm: CompressionAlgorithm::BZip2,
            compressed_data: Bytes::from_static(b"data"),
        };
        assert!(packet.decompress().is_err());
    }
}
