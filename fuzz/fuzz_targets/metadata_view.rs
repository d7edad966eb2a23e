#![no_main]

use libfuzzer_sys::fuzz_target;
use dotemit::{metadata::view::MetadataView, ReadOptions};

fuzz_target!(|data: &[u8]| {
    let _ = MetadataView::from_bytes(data);
    let _ = MetadataView::from_bytes_with(data, &ReadOptions::strict());
});
