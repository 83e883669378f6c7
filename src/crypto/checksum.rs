use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use crate::errors::{bail, ensure_eq, Result};

/// Calculate the two octet checksum: sum of all octets mod 65536.
pub fn calculate_simple(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, v| acc.wrapping_add((*v).into()))
}

/// Verify the two octet checksum, in constant time.
pub fn simple(expected: &[u8], data: &[u8]) -> Result<()> {
    ensure_eq!(expected.len(), 2, "invalid simple checksum length");

    let actual = calculate_simple(data).to_be_bytes();
    let ok: bool = expected.ct_eq(&actual).into();
    if !ok {
        bail!("invalid simple checksum");
    }

    Ok(())
}

/// Verify the SHA1 checksum (first 20 octets), in constant time.
pub fn sha1(expected: &[u8], data: &[u8]) -> Result<()> {
    ensure_eq!(expected.len(), 20, "invalid SHA1 checksum length");

    let actual = Sha1::digest(data);
    let ok: bool = expected.ct_eq(&actual).into();
    if !ok {
        bail!("invalid SHA1 checksum");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_checksum() {
        assert_eq!(calculate_simple(&[]), 0);
        assert_eq!(calculate_simple(&[1, 2, 3]), 6);
        // wraps mod 65536
        assert_eq!(calculate_simple(&[0xFF; 257]), (0xFFu16).wrapping_mul(257));

        let data = [1u8, 2, 3];
        simple(&6u16.to_be_bytes(), &data).unwrap();
        assert!(simple(&7u16.to_be_bytes(), &data).is_err());
        assert!(simple(&[0x06], &data).is_err());
    }

    #[test]
    fn sha1_checksum() {
        let data = b"some secret material";
        let digest = Sha1::digest(data);
        sha1(&digest, data).unwrap();

        let mut wrong = digest;
        wrong[0] ^= 0xFF;
        assert!(sha1(&wrong, data).is_err());
    }
}
