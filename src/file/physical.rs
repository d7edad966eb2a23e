use std::{fs, path::Path};

use memmap2::Mmap;

use super::Backend;
use crate::Result;

/// Input file backed by a read-only memory mapping
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Open and map the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path)?;
        // The mapping is read-only; the file must not be truncated while the image is loaded
        let data = unsafe { Mmap::map(&file) }?;

        Ok(Physical { data })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn physical() {
        let path = std::env::temp_dir().join(format!("dotemit-physical-{}.bin", std::process::id()));
        fs::File::create(&path)
            .unwrap()
            .write_all(&[0x4D, 0x5A, 0x90, 0x00])
            .unwrap();

        let physical = Physical::new(&path).unwrap();
        assert_eq!(physical.len(), 4);
        assert_eq!(physical.data_slice(0, 2).unwrap(), b"MZ");
        assert!(physical.data_slice(2, 4).is_err());

        drop(physical);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing() {
        assert!(matches!(
            Physical::new("/nonexistent/dotemit/input.dll"),
            Err(crate::Error::FileError(_))
        ));
    }
}
