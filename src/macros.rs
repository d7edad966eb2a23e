//! Helper macros used across the crate.

/// Declares a typed arena handle into a [`crate::model::ModuleImage`].
///
/// A handle is the pair of the owning image's id and the 0-based position in one of its arenas;
/// the id lets the build context reject handles that come from another image.
///
/// ```rust, ignore
///  define_handle!(TypeDefHandle, "A type defined in the image");
/// ```
macro_rules! define_handle {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            pub(crate) image: $crate::model::ImageId,
            pub(crate) index: usize,
        }

        impl $name {
            /// The image this handle belongs to
            #[must_use]
            pub fn image(&self) -> $crate::model::ImageId {
                self.image
            }

            /// Position in the owning arena, in insertion order
            #[must_use]
            pub fn index(&self) -> usize {
                self.index
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}@{}", stringify!($name), self.index, self.image)
            }
        }
    };
}
