//! Small encoding and arithmetic helpers shared by the readers and the build context.

mod compressed;
mod math;

pub use compressed::{
    compressed_uint_size, write_compressed_int, write_compressed_uint, MAX_COMPRESSED_UINT,
};
pub use math::{align_to, to_u32};
