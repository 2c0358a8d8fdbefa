//! SQLite-backed store for a manga library.
//!
//! This crate persists manga and categories, records which manga belong to
//! which categories, and answers the queries a library screen needs.
//!
//! # Architecture
//! - **Records**: [`Manga`] and [`Category`] rows, each with a store-assigned,
//!   never-zero identifier. Unsaved records are [`NewManga`] and
//!   [`NewCategory`]; there is no "id 0 means unsaved" convention.
//! - **Associations**: many-to-many [`MangaCategory`] edges. An edge can only
//!   be recorded between records that already exist.
//! - **Library view**: favorite manga, each annotated with the category of
//!   its most recently recorded association.
//! - **Default category**: [`Library::insert_default_category`] creates a
//!   category named "Default", but only while the library has none.
//!
//! [`Repository`] is the async API. [`Library`] wraps it with its own runtime
//! and hands out [`Pending`] completion handles that can be executed as
//! blocking calls.
//!
//! ```
//! use shelf_store::{Library, NewCategory, NewManga, NewMangaCategory};
//!
//! let library = Library::open_in_memory()?;
//! let manga = library
//!     .insert_manga(&NewManga { favorite: true, ..NewManga::new("/manga/1", "Berserk") })
//!     .execute_as_blocking()?;
//! let reading = library.insert_category(&NewCategory::new("Reading")).execute_as_blocking()?;
//! library.insert_manga_category(&NewMangaCategory::new(&manga, &reading)).execute_as_blocking()?;
//!
//! let shelved = library.get_library_mangas().execute_as_blocking()?;
//! assert_eq!(shelved[0].category, Some(reading.id));
//! library.close();
//! # Ok::<(), shelf_store::error::Error>(())
//! ```

mod db;
pub mod error;
mod library;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::library::{Library, Pending};
pub use crate::models::{
    Category, CategoryId, DEFAULT_CATEGORY_NAME, Manga, MangaCategory, MangaCategoryId, MangaId, MangaStatus,
    NewCategory, NewManga, NewMangaCategory,
};
pub use crate::repo::Repository;
