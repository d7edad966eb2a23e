//! ECMA-335 II.23.2 compressed unsigned integers.
//!
//! Blob and user string lengths and every integer inside a signature use this encoding. The
//! matching decoder is [`crate::Parser::read_compressed_uint`].

use crate::Result;

/// Largest value the standard 4-byte form can carry.
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// Number of bytes [`write_compressed_uint`] emits for `value`.
///
/// Values above [`MAX_COMPRESSED_UINT`] report 4; only `u32::MAX` can actually be written.
#[must_use]
pub fn compressed_uint_size(value: u32) -> usize {
    if value <= 0x7F {
        1
    } else if value <= 0x3FFF {
        2
    } else {
        4
    }
}

/// Append the compressed encoding of `value` to `out`.
///
/// `u32::MAX` is written as the sentinel `FF FF FF FF`, which the reader maps back to
/// `u32::MAX`. Every other value above [`MAX_COMPRESSED_UINT`] has no encoding.
///
/// # Errors
/// Returns [`crate::Error::Precondition`] for values in `0x2000_0000..0xFFFF_FFFF`.
///
/// # Examples
///
/// ```rust
/// use dotemit::utils::write_compressed_uint;
///
/// let mut out = Vec::new();
/// write_compressed_uint(0x80, &mut out)?;
/// write_compressed_uint(0x4000, &mut out)?;
/// assert_eq!(out, [0x80, 0x80, 0xC0, 0x00, 0x40, 0x00]);
/// # Ok::<(), dotemit::Error>(())
/// ```
pub fn write_compressed_uint(value: u32, out: &mut Vec<u8>) -> Result<()> {
    match value {
        0..=0x7F => out.push(value as u8),
        0x80..=0x3FFF => {
            out.push(0x80 | (value >> 8) as u8);
            out.push(value as u8);
        }
        0x4000..=MAX_COMPRESSED_UINT => {
            out.extend_from_slice(&(value | 0xC000_0000).to_be_bytes());
        }
        u32::MAX => out.extend_from_slice(&[0xFF; 4]),
        _ => {
            return Err(crate::Error::Precondition(format!(
                "0x{value:x} exceeds the compressed integer range"
            )))
        }
    }

    Ok(())
}

/// Append the compressed signed encoding of `value` to `out` (ECMA-335 II.23.2).
///
/// Used for array lower bounds. The sign bit is rotated into the lowest bit of the 7, 14 or 29
/// bit payload.
///
/// # Errors
/// Returns [`crate::Error::Precondition`] for values outside `-2^28..2^28`.
pub fn write_compressed_int(value: i32, out: &mut Vec<u8>) -> Result<()> {
    let sign = u32::from(value < 0);
    let (mask, bits) = match value {
        -0x40..=0x3F => (0x7F, 7),
        -0x2000..=0x1FFF => (0x3FFF, 14),
        -0x1000_0000..=0x0FFF_FFFF => (0x1FFF_FFFF, 29),
        _ => {
            return Err(crate::Error::Precondition(format!(
                "{value} exceeds the compressed signed integer range"
            )))
        }
    };

    #[allow(clippy::cast_sign_loss)]
    let rotated = (((value as u32) << 1) | sign) & mask;
    match bits {
        7 => out.push(rotated as u8),
        14 => {
            out.push(0x80 | (rotated >> 8) as u8);
            out.push(rotated as u8);
        }
        _ => out.extend_from_slice(&(rotated | 0xC000_0000).to_be_bytes()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Parser;

    #[test]
    fn sample_values() {
        let samples = [
            (0_u32, 1_usize),
            (0x7F, 1),
            (0x80, 2),
            (0x3FFF, 2),
            (0x4000, 4),
            (0xFFFF_FFFF, 4),
        ];

        for (value, length) in samples {
            let mut out = Vec::new();
            write_compressed_uint(value, &mut out).unwrap();
            assert_eq!(out.len(), length, "value 0x{value:x}");
            assert_eq!(compressed_uint_size(value), length);

            let mut parser = Parser::new(&out);
            assert_eq!(parser.read_compressed_uint().unwrap(), value);
        }
    }

    #[test]
    fn boundary_bytes() {
        let mut out = Vec::new();
        write_compressed_uint(0x3FFF, &mut out).unwrap();
        write_compressed_uint(MAX_COMPRESSED_UINT, &mut out).unwrap();
        assert_eq!(out, [0xBF, 0xFF, 0xDF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn unencodable() {
        let mut out = Vec::new();
        assert!(write_compressed_uint(MAX_COMPRESSED_UINT + 1, &mut out).is_err());
        assert!(write_compressed_uint(0xFFFF_FFFE, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn signed_values() {
        let samples: [(i32, &[u8]); 6] = [
            (3, &[0x06]),
            (-3, &[0x7B]),
            (64, &[0x80, 0x80]),
            (-64, &[0x01]),
            (-8192, &[0x80, 0x01]),
            (-268_435_456, &[0xC0, 0x00, 0x00, 0x01]),
        ];

        for (value, expected) in samples {
            let mut out = Vec::new();
            write_compressed_int(value, &mut out).unwrap();
            assert_eq!(out, expected, "value {value}");
        }

        assert!(write_compressed_int(0x1000_0000, &mut Vec::new()).is_err());
    }
}
