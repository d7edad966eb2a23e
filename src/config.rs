//! Options for reading and building metadata.
//!
//! [`ReadOptions`] controls how much the `#~` reader checks beyond what is needed to decode rows.
//! [`BuildOptions`] controls the header values and layout decisions of
//! [`crate::builder::MetadataBuffer`].

/// Default metadata root version string, as emitted by the .NET Framework 4 toolchain
pub const DEFAULT_VERSION_STRING: &str = "v4.0.30319";

/// Reader configuration
///
/// # Examples
///
/// ```rust
/// use dotemit::ReadOptions;
///
/// let options = ReadOptions::strict();
/// assert!(options.validate_rids);
/// assert!(options.reject_unsorted);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Check that every row id in a coded or plain index column is within the row count of the
    /// table it points into. Tag validity is always checked.
    pub validate_rids: bool,

    /// Treat a table whose `sorted` bit is set but whose rows are out of key order as an error
    /// instead of logging a warning.
    pub reject_unsorted: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            validate_rids: true,
            reject_unsorted: false,
        }
    }
}

impl ReadOptions {
    /// Every check enabled
    #[must_use]
    pub fn strict() -> Self {
        Self {
            validate_rids: true,
            reject_unsorted: true,
        }
    }

    /// Only the checks row decoding cannot do without; useful for damaged or obfuscated images
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            validate_rids: false,
            reject_unsorted: false,
        }
    }
}

/// Writer configuration
///
/// # Examples
///
/// ```rust
/// use dotemit::BuildOptions;
///
/// let options = BuildOptions::default()
///     .with_version("v2.0.50727")
///     .with_large_heaps(true);
/// assert_eq!(options.version, "v2.0.50727");
/// assert!(options.sort_tables);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Version string of the metadata root
    pub version: String,
    /// `MajorVersion` of the `#~` header
    pub tables_major_version: u8,
    /// `MinorVersion` of the `#~` header
    pub tables_minor_version: u8,
    /// Sort the tables ECMA-335 requires to be ordered by their primary key
    pub sort_tables: bool,
    /// Use 4-byte indices into all three index heaps regardless of their size
    pub large_heaps: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION_STRING.to_string(),
            tables_major_version: 2,
            tables_minor_version: 0,
            sort_tables: true,
            large_heaps: false,
        }
    }
}

impl BuildOptions {
    /// Set the metadata root version string
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the `#~` schema version
    #[must_use]
    pub fn with_tables_version(mut self, major: u8, minor: u8) -> Self {
        self.tables_major_version = major;
        self.tables_minor_version = minor;
        self
    }

    /// Enable or disable sorting of the sorted tables
    #[must_use]
    pub fn with_sorting(mut self, sort_tables: bool) -> Self {
        self.sort_tables = sort_tables;
        self
    }

    /// Force 4-byte heap indices
    #[must_use]
    pub fn with_large_heaps(mut self, large_heaps: bool) -> Self {
        self.large_heaps = large_heaps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let read = ReadOptions::default();
        assert!(read.validate_rids);
        assert!(!read.reject_unsorted);
        assert_eq!(ReadOptions::lenient(), ReadOptions {
            validate_rids: false,
            reject_unsorted: false
        });

        let build = BuildOptions::default();
        assert_eq!(build.version, DEFAULT_VERSION_STRING);
        assert_eq!(
            (build.tables_major_version, build.tables_minor_version),
            (2, 0)
        );
        assert!(!build.large_heaps);
    }

    #[test]
    fn builder_methods() {
        let build = BuildOptions::default()
            .with_tables_version(1, 1)
            .with_sorting(false);
        assert_eq!(build.tables_major_version, 1);
        assert_eq!(build.tables_minor_version, 1);
        assert!(!build.sort_tables);
    }
}
