use crate::error::{Error, ErrorKind};
use crate::models::{CategoryId, MangaId};
use exn::ResultExt;
use time::UtcDateTime;

/// Publication status, as reported by the manga's source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum MangaStatus {
    #[default]
    Unknown,
    Ongoing,
    Completed,
    Licensed,
}
impl TryFrom<i64> for MangaStatus {
    type Error = Error;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Unknown,
            1 => Self::Ongoing,
            2 => Self::Completed,
            3 => Self::Licensed,
            _ => exn::bail!(ErrorKind::InvalidData("manga status")),
        })
    }
}
impl From<MangaStatus> for i64 {
    fn from(status: MangaStatus) -> Self {
        match status {
            MangaStatus::Unknown => 0,
            MangaStatus::Ongoing => 1,
            MangaStatus::Completed => 2,
            MangaStatus::Licensed => 3,
        }
    }
}

/// A manga that has not been persisted yet.
///
/// The store allocates the identifier on insert; there is no way to pick
/// one up front.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewManga {
    /// Catalogue the manga was found in.
    pub source: i64,
    pub url: String,
    pub title: String,
    pub artist: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub status: MangaStatus,
    pub thumbnail_url: Option<String>,
    /// Favorites make up the library.
    pub favorite: bool,
    pub last_update: Option<UtcDateTime>,
    /// Whether full details have been fetched from the source.
    pub initialized: bool,
    pub viewer: i32,
    pub chapter_flags: i32,
}
impl NewManga {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source: 0,
            url: url.into(),
            title: title.into(),
            artist: None,
            author: None,
            description: None,
            genre: None,
            status: MangaStatus::Unknown,
            thumbnail_url: None,
            favorite: false,
            last_update: None,
            initialized: false,
            viewer: 0,
            chapter_flags: 0,
        }
    }
}

/// A persisted manga.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Manga {
    pub id: MangaId,
    pub source: i64,
    pub url: String,
    pub title: String,
    pub artist: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub status: MangaStatus,
    pub thumbnail_url: Option<String>,
    pub favorite: bool,
    pub last_update: Option<UtcDateTime>,
    pub initialized: bool,
    pub viewer: i32,
    pub chapter_flags: i32,
    /// Category the manga is shelved under. Only library queries fill this
    /// in; it is derived from associations and can't be set directly.
    pub category: Option<CategoryId>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MangaRow {
    pub(crate) id: i64,
    pub(crate) source: i64,
    pub(crate) url: String,
    pub(crate) title: String,
    pub(crate) artist: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) genre: Option<String>,
    pub(crate) status: i64,
    pub(crate) thumbnail_url: Option<String>,
    pub(crate) favorite: bool,
    pub(crate) last_update: Option<i64>,
    pub(crate) initialized: bool,
    pub(crate) viewer: i64,
    pub(crate) chapter_flags: i64,
    /// Only present when selected through the library view.
    #[sqlx(default)]
    pub(crate) category: Option<i64>,
}
impl TryFrom<MangaRow> for Manga {
    type Error = Error;
    fn try_from(row: MangaRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MangaId::try_from(row.id)?,
            source: row.source,
            url: row.url,
            title: row.title,
            artist: row.artist,
            author: row.author,
            description: row.description,
            genre: row.genre,
            status: MangaStatus::try_from(row.status)?,
            thumbnail_url: row.thumbnail_url,
            favorite: row.favorite,
            last_update: row
                .last_update
                .map(|ts| UtcDateTime::from_unix_timestamp(ts).or_raise(|| ErrorKind::InvalidData("last update")))
                .transpose()?,
            initialized: row.initialized,
            viewer: i32::try_from(row.viewer).or_raise(|| ErrorKind::InvalidData("viewer"))?,
            chapter_flags: i32::try_from(row.chapter_flags).or_raise(|| ErrorKind::InvalidData("chapter flags"))?,
            category: row.category.map(CategoryId::try_from).transpose()?,
        })
    }
}
