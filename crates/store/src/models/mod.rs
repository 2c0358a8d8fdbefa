mod association;
mod category;
mod id;
mod manga;

pub use self::association::{MangaCategory, NewMangaCategory};
pub use self::category::{Category, DEFAULT_CATEGORY_NAME, NewCategory};
pub use self::id::{CategoryId, MangaCategoryId, MangaId};
pub use self::manga::{Manga, MangaStatus, NewManga};

pub(crate) use self::association::MangaCategoryRow;
pub(crate) use self::category::CategoryRow;
pub(crate) use self::manga::MangaRow;
