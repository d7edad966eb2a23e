//! Bounds-checked little-endian reading and writing of primitive values.
//!
//! Every multi-byte integer in the metadata root, the `#~` stream and the heaps is stored
//! little-endian. The helpers here are shared by the readers and the serializers: readers advance
//! an offset through an input slice, writers fill a pre-sized output slice in place. Column
//! widths that depend on row counts or heap sizes go through the `_dyn` variants, which select
//! between 2 and 4 bytes.
//!
//! # Key Components
//!
//! - [`crate::file::io::CilIO`] - Conversion between primitives and their byte arrays
//! - [`crate::file::io::read_le`] / [`crate::file::io::read_le_at`] - Fixed size reads
//! - [`crate::file::io::read_le_at_dyn`] - 2 or 4 byte index reads
//! - [`crate::file::io::write_le_at`] / [`crate::file::io::write_le_at_dyn`] - Matching writes

use crate::{Error::OutOfBounds, Result};

/// Primitive types that can be read from and written to little-endian byte arrays.
pub trait CilIO: Sized {
    /// The fixed-size byte array representation of the type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Build a value from its little-endian representation
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Convert the value into its little-endian representation
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cil_io {
    ($($ty:ty),*) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Read a value from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Read a value at `offset` and advance the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit in the remaining data.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Read a 4-byte value if `is_large`, a 2-byte value otherwise.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit in the remaining data.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

/// Write a value to the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
pub fn write_le<T: CilIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Write a value at `offset` and advance the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit in the remaining space.
pub fn write_le_at<T: CilIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let bytes = value.to_le_bytes();
    data[*offset..end].copy_from_slice(bytes.as_ref());
    *offset = end;

    Ok(())
}

/// Write `value` as 4 bytes if `is_large`, as 2 bytes otherwise.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit in the remaining space, or
/// [`crate::Error::Malformed`] if a small column is asked to hold a value above `u16::MAX`.
pub fn write_le_at_dyn(
    data: &mut [u8],
    offset: &mut usize,
    value: u32,
    is_large: bool,
) -> Result<()> {
    if is_large {
        write_le_at::<u32>(data, offset, value)?;
    } else {
        let Ok(small) = u16::try_from(value) else {
            return Err(malformed_error!(
                "Value 0x{:x} does not fit a 2-byte column at offset {}",
                value,
                offset
            ));
        };
        write_le_at::<u16>(data, offset, small)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_u64() {
        let result = read_le::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807_0605_0403_0201);
    }

    #[test]
    fn read_le_at_advances() {
        let mut offset = 2;
        assert_eq!(read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap(), 0x0403);
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_le_dyn() {
        let mut offset = 0;
        assert_eq!(read_le_at_dyn(&TEST_BUFFER, &mut offset, false).unwrap(), 0x0201);
        assert_eq!(read_le_at_dyn(&TEST_BUFFER, &mut offset, true).unwrap(), 0x0605_0403);
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_out_of_bounds() {
        let mut offset = 6;
        assert!(matches!(
            read_le_at::<u32>(&TEST_BUFFER, &mut offset),
            Err(OutOfBounds)
        ));
        assert_eq!(offset, 6);

        let mut offset = usize::MAX;
        assert!(read_le_at::<u8>(&TEST_BUFFER, &mut offset).is_err());
    }

    #[test]
    fn write_le_values() {
        let mut buffer = [0u8; 8];
        let mut offset = 0;
        write_le_at(&mut buffer, &mut offset, 0x0201_u16).unwrap();
        write_le_at(&mut buffer, &mut offset, 0x0605_0403_u32).unwrap();
        write_le_at(&mut buffer, &mut offset, 0x07_u8).unwrap();
        assert_eq!(offset, 7);
        assert_eq!(buffer, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x00]);

        assert!(write_le_at(&mut buffer, &mut offset, 0_u16).is_err());
    }

    #[test]
    fn write_le_dyn() {
        let mut buffer = [0u8; 6];
        let mut offset = 0;
        write_le_at_dyn(&mut buffer, &mut offset, 0xBEEF, false).unwrap();
        write_le_at_dyn(&mut buffer, &mut offset, 0x0001_0000, true).unwrap();
        assert_eq!(buffer, [0xEF, 0xBE, 0x00, 0x00, 0x01, 0x00]);

        let mut offset = 0;
        assert!(matches!(
            write_le_at_dyn(&mut buffer, &mut offset, 0x0001_0000, false),
            Err(crate::Error::Malformed { .. })
        ));
    }
}
