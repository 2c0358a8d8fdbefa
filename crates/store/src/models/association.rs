use crate::error::Error;
use crate::models::{Category, CategoryId, Manga, MangaCategoryId, MangaId};

/// An edge to be recorded between a manga and a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewMangaCategory {
    pub manga_id: MangaId,
    pub category_id: CategoryId,
}
impl NewMangaCategory {
    pub fn new(manga: &Manga, category: &Category) -> Self {
        Self { manga_id: manga.id, category_id: category.id }
    }
}
impl From<(MangaId, CategoryId)> for NewMangaCategory {
    fn from((manga_id, category_id): (MangaId, CategoryId)) -> Self {
        Self { manga_id, category_id }
    }
}

/// A recorded manga/category membership edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MangaCategory {
    pub id: MangaCategoryId,
    pub manga_id: MangaId,
    pub category_id: CategoryId,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MangaCategoryRow {
    pub(crate) id: i64,
    pub(crate) manga_id: i64,
    pub(crate) category_id: i64,
}
impl TryFrom<MangaCategoryRow> for MangaCategory {
    type Error = Error;
    fn try_from(row: MangaCategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MangaCategoryId::try_from(row.id)?,
            manga_id: MangaId::try_from(row.manga_id)?,
            category_id: CategoryId::try_from(row.category_id)?,
        })
    }
}
