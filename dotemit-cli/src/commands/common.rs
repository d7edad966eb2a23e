use std::path::Path;

use anyhow::Context;
use dotemit::{metadata::root::CIL_HEADER_MAGIC, File};
use log::debug;

/// Read the metadata of `path`: a raw blob starting with the `BSJB` signature is taken as is,
/// anything else is parsed as a PE image and its CLR metadata directory extracted.
pub fn load_metadata(path: &Path) -> anyhow::Result<Vec<u8>> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read: {}", path.display()))?;

    if data.starts_with(&CIL_HEADER_MAGIC.to_le_bytes()) {
        debug!("{} is a raw metadata blob", path.display());
        return Ok(data);
    }

    let file = File::from_mem(data)
        .with_context(|| format!("failed to load PE image: {}", path.display()))?;
    let metadata = file
        .metadata()
        .with_context(|| format!("failed to locate metadata: {}", path.display()))?;
    debug!("{}: {} bytes of metadata", path.display(), metadata.len());
    Ok(metadata.to_vec())
}
