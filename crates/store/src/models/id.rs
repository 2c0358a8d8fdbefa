use crate::error::{Error, ErrorKind};
use derive_more::Display;
use exn::OptionExt;
use std::num::NonZeroU64;

/// Store-assigned identifiers are never zero, and are always representable
/// as an SQLite `INTEGER`.
macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Returns `None` for zero, or for values SQLite can't store.
            pub const fn new(id: u64) -> Option<Self> {
                if id > i64::MAX as u64 {
                    return None;
                }
                match NonZeroU64::new(id) {
                    Some(id) => Some(Self(id)),
                    None => None,
                }
            }

            pub const fn get(self) -> u64 {
                self.0.get()
            }
        }
        impl TryFrom<i64> for $name {
            type Error = Error;
            fn try_from(id: i64) -> Result<Self, Self::Error> {
                u64::try_from(id).ok().and_then(Self::new).ok_or_raise(|| ErrorKind::InvalidData($what))
            }
        }
        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                // Lossless: construction rejects anything above i64::MAX.
                id.get() as i64
            }
        }
    };
}

record_id!(
    /// Identifier of a persisted manga.
    MangaId,
    "manga id"
);
record_id!(
    /// Identifier of a persisted category.
    CategoryId,
    "category id"
);
record_id!(
    /// Identifier of a manga/category association edge. Later edges always
    /// have larger identifiers.
    MangaCategoryId,
    "manga category id"
);
