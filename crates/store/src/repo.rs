//! Repository for manga, categories and the associations between them.
//!
//! The three tables are tightly coupled: an association is meaningless
//! without both of its records, and the library view is a join across all
//! of them. So they share one repository.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    Category, CategoryId, CategoryRow, DEFAULT_CATEGORY_NAME, Manga, MangaCategory, MangaCategoryRow, MangaId,
    MangaRow, NewCategory, NewManga, NewMangaCategory,
};
use exn::ResultExt;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

fn into_models<R, M>(rows: Vec<R>) -> Result<Vec<M>>
where
    M: TryFrom<R, Error = crate::error::Error>,
{
    rows.into_iter().map(M::try_from).collect()
}

/// Async access to the library tables.
///
/// Every method runs as a single statement or a single transaction, so a
/// failed call leaves no partial records behind and a query never observes a
/// mutation halfway through.
///
/// # Relationships
///
/// - A manga can be associated with many categories, and vice versa
/// - Each (manga, category) pair is recorded at most once
/// - Associations can only reference records that already exist
/// - The library view projects a single category per manga: the most
///   recently recorded association wins
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Manga
    // =========================================================================

    /// Persist a new manga and return it with its freshly allocated id.
    #[instrument(level = "debug", skip_all, fields(title = %manga.title, favorite = manga.favorite))]
    pub async fn insert_manga(&self, manga: &NewManga) -> Result<Manga> {
        let row: MangaRow = sqlx::query_as(include_str!("../queries/insert_manga.sql"))
            .bind(manga.source)
            .bind(manga.url.as_str())
            .bind(manga.title.as_str())
            .bind(manga.artist.as_deref())
            .bind(manga.author.as_deref())
            .bind(manga.description.as_deref())
            .bind(manga.genre.as_deref())
            .bind(i64::from(manga.status))
            .bind(manga.thumbnail_url.as_deref())
            .bind(manga.favorite)
            .bind(manga.last_update.map(|t| t.unix_timestamp()))
            .bind(manga.initialized)
            .bind(manga.viewer)
            .bind(manga.chapter_flags)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let manga = Manga::try_from(row)?;
        tracing::debug!(id = %manga.id, "Inserted manga");
        Ok(manga)
    }

    /// All manga, in insertion order.
    pub async fn get_mangas(&self) -> Result<Vec<Manga>> {
        let rows: Vec<MangaRow> = sqlx::query_as(include_str!("../queries/get_mangas.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        into_models(rows)
    }

    pub async fn get_manga(&self, id: MangaId) -> Result<Option<Manga>> {
        let row: Option<MangaRow> = sqlx::query_as(include_str!("../queries/get_manga.sql"))
            .bind(i64::from(id))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Manga::try_from).transpose()
    }

    /// Look up a manga by its source URL.
    ///
    /// URLs are not unique; if the same URL was inserted twice for a source,
    /// the oldest record is returned.
    pub async fn get_manga_by_url(&self, url: impl AsRef<str>, source: i64) -> Result<Option<Manga>> {
        let row: Option<MangaRow> = sqlx::query_as(include_str!("../queries/get_manga_by_url.sql"))
            .bind(url.as_ref())
            .bind(source)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Manga::try_from).transpose()
    }

    /// Add a manga to, or remove it from, the library.
    #[instrument(level = "debug", skip(self))]
    pub async fn set_manga_favorite(&self, id: MangaId, favorite: bool) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/set_manga_favorite.sql"))
            .bind(favorite)
            .bind(i64::from(id))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::MangaNotFound(id));
        }
        Ok(())
    }

    // =========================================================================
    // Library
    // =========================================================================

    /// All favorite manga, in insertion order, each annotated with the
    /// category it is shelved under (if any).
    pub async fn get_library_mangas(&self) -> Result<Vec<Manga>> {
        let rows: Vec<MangaRow> = sqlx::query_as(include_str!("../queries/get_library_mangas.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        into_models(rows)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Persist a new category and return it with its freshly allocated id.
    ///
    /// Returns [`ErrorKind::Validation`] if the name is blank.
    #[instrument(level = "debug", skip_all, fields(name = %category.name))]
    pub async fn insert_category(&self, category: &NewCategory) -> Result<Category> {
        category.validate()?;
        let row: CategoryRow = sqlx::query_as(include_str!("../queries/insert_category.sql"))
            .bind(category.name.as_str())
            .bind(category.order)
            .bind(category.flags)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Category::try_from(row)
    }

    /// Create the "Default" category, but only if no category exists yet.
    ///
    /// Returns the new category, or `None` if the library already had at
    /// least one category and nothing was created.
    #[instrument(level = "debug", skip(self))]
    pub async fn insert_default_category(&self) -> Result<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(include_str!("../queries/insert_default_category.sql"))
            .bind(DEFAULT_CATEGORY_NAME)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let category = row.map(Category::try_from).transpose()?;
        if let Some(category) = &category {
            tracing::info!(id = %category.id, "Library had no categories; created the default category");
        }
        Ok(category)
    }

    /// All categories, by sort order and then creation order.
    pub async fn get_categories(&self) -> Result<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(include_str!("../queries/get_categories.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        into_models(rows)
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(include_str!("../queries/get_category.sql"))
            .bind(i64::from(id))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Category::try_from).transpose()
    }

    // =========================================================================
    // Associations
    // =========================================================================

    /// Record that a manga belongs to a category.
    ///
    /// Re-recording an existing pair replaces it with a new edge, which makes
    /// it the most recent association for that manga.
    ///
    /// Returns [`ErrorKind::MangaNotFound`] or [`ErrorKind::CategoryNotFound`]
    /// (and records nothing) if either side doesn't exist.
    #[instrument(level = "debug", skip(self))]
    pub async fn insert_manga_category(&self, edge: &NewMangaCategory) -> Result<MangaCategory> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let inserted = Self::insert_edge(&mut tx, edge).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(inserted)
    }

    /// Record several associations at once.
    ///
    /// All-or-nothing: if any edge references a missing record, none of the
    /// edges are recorded.
    #[instrument(level = "debug", skip_all, fields(count = edges.len()))]
    pub async fn insert_manga_categories(&self, edges: &[NewMangaCategory]) -> Result<Vec<MangaCategory>> {
        if edges.is_empty() {
            return Ok(Vec::new());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let mut inserted = Vec::with_capacity(edges.len());
        for edge in edges {
            inserted.push(Self::insert_edge(&mut tx, edge).await?);
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(inserted)
    }

    async fn insert_edge(conn: &mut SqliteConnection, edge: &NewMangaCategory) -> Result<MangaCategory> {
        let manga_id = i64::from(edge.manga_id);
        let category_id = i64::from(edge.category_id);
        // Write first: this takes SQLite's write lock, so the existence
        // checks below can't go stale before the insert lands.
        sqlx::query(include_str!("../queries/delete_manga_category.sql"))
            .bind(manga_id)
            .bind(category_id)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let manga_exists: bool = sqlx::query_scalar(include_str!("../queries/manga_exists.sql"))
            .bind(manga_id)
            .fetch_one(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if !manga_exists {
            tracing::warn!(manga = %edge.manga_id, category = %edge.category_id, "Association references a missing manga");
            exn::bail!(ErrorKind::MangaNotFound(edge.manga_id));
        }
        let category_exists: bool = sqlx::query_scalar(include_str!("../queries/category_exists.sql"))
            .bind(category_id)
            .fetch_one(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if !category_exists {
            tracing::warn!(manga = %edge.manga_id, category = %edge.category_id, "Association references a missing category");
            exn::bail!(ErrorKind::CategoryNotFound(edge.category_id));
        }
        let row: MangaCategoryRow = sqlx::query_as(include_str!("../queries/insert_manga_category.sql"))
            .bind(manga_id)
            .bind(category_id)
            .fetch_one(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        MangaCategory::try_from(row)
    }

    /// Every category a manga belongs to, ordered like [`get_categories`](Self::get_categories).
    pub async fn get_categories_for_manga(&self, id: MangaId) -> Result<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(include_str!("../queries/get_categories_for_manga.sql"))
            .bind(i64::from(id))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        into_models(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MangaStatus;
    use time::UtcDateTime;

    async fn repository() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    fn favorite(title: &str) -> NewManga {
        NewManga {
            favorite: true,
            ..NewManga::new(format!("/manga/{title}"), title)
        }
    }

    #[tokio::test]
    async fn test_insert_manga_persists_every_field() {
        let repo = repository().await;
        let updated = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let input = NewManga {
            source: 7,
            artist: Some("Artist".to_string()),
            author: Some("Author".to_string()),
            description: Some("long description".to_string()),
            genre: Some("a list of genres".to_string()),
            status: MangaStatus::Completed,
            thumbnail_url: Some("https://example.org/cover.jpg".to_string()),
            favorite: true,
            last_update: Some(updated),
            initialized: true,
            viewer: 1,
            chapter_flags: 4,
            ..NewManga::new("/manga/1", "Title")
        };
        let inserted = repo.insert_manga(&input).await.unwrap();
        let fetched = repo.get_manga(inserted.id).await.unwrap().unwrap();
        assert_eq!(inserted, fetched);
        assert_eq!(fetched.status, MangaStatus::Completed);
        assert_eq!(fetched.last_update, Some(updated));
        assert_eq!(fetched.genre.as_deref(), Some("a list of genres"));
        assert_eq!(fetched.category, None);
    }

    #[tokio::test]
    async fn test_ids_are_allocated_in_insertion_order() {
        let repo = repository().await;
        let first = repo.insert_manga(&favorite("first")).await.unwrap();
        let second = repo.insert_manga(&favorite("second")).await.unwrap();
        assert!(first.id < second.id);
        let titles = repo.get_mangas().await.unwrap().into_iter().map(|m| m.title).collect::<Vec<_>>();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_get_manga_by_url_is_scoped_to_source() {
        let repo = repository().await;
        let manga = repo
            .insert_manga(&NewManga { source: 3, ..NewManga::new("/manga/x", "X") })
            .await
            .unwrap();
        assert_eq!(repo.get_manga_by_url("/manga/x", 3).await.unwrap(), Some(manga));
        assert_eq!(repo.get_manga_by_url("/manga/x", 4).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_favorite_moves_manga_in_and_out_of_library() {
        let repo = repository().await;
        let manga = repo.insert_manga(&NewManga::new("/manga/1", "One")).await.unwrap();
        assert!(repo.get_library_mangas().await.unwrap().is_empty());
        repo.set_manga_favorite(manga.id, true).await.unwrap();
        assert_eq!(repo.get_library_mangas().await.unwrap().len(), 1);
        repo.set_manga_favorite(manga.id, false).await.unwrap();
        assert!(repo.get_library_mangas().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_favorite_on_missing_manga() {
        let repo = repository().await;
        let missing = MangaId::new(99).unwrap();
        let err = repo.set_manga_favorite(missing, true).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::MangaNotFound(id) if *id == missing));
    }

    #[tokio::test]
    async fn test_most_recent_association_wins() {
        let repo = repository().await;
        let manga = repo.insert_manga(&favorite("one")).await.unwrap();
        let reading = repo.insert_category(&NewCategory::new("Reading")).await.unwrap();
        let hold = repo.insert_category(&NewCategory::new("Hold")).await.unwrap();

        repo.insert_manga_category(&NewMangaCategory::new(&manga, &reading)).await.unwrap();
        repo.insert_manga_category(&NewMangaCategory::new(&manga, &hold)).await.unwrap();
        let library = repo.get_library_mangas().await.unwrap();
        assert_eq!(library.len(), 1, "a manga in two categories must appear once");
        assert_eq!(library[0].category, Some(hold.id));

        // Re-recording an existing pair makes it the most recent again.
        repo.insert_manga_category(&NewMangaCategory::new(&manga, &reading)).await.unwrap();
        let library = repo.get_library_mangas().await.unwrap();
        assert_eq!(library[0].category, Some(reading.id));
        assert_eq!(repo.get_categories_for_manga(manga.id).await.unwrap(), vec![reading, hold]);
    }

    #[tokio::test]
    async fn test_association_to_missing_records_is_rejected() {
        let repo = repository().await;
        let manga = repo.insert_manga(&favorite("one")).await.unwrap();
        let category = repo.insert_category(&NewCategory::new("Reading")).await.unwrap();
        let missing_manga = MangaId::new(1000).unwrap();
        let missing_category = CategoryId::new(1000).unwrap();

        let err = repo.insert_manga_category(&(missing_manga, category.id).into()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::MangaNotFound(id) if *id == missing_manga));
        assert!(err.is_referential());

        let err = repo.insert_manga_category(&(manga.id, missing_category).into()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CategoryNotFound(id) if *id == missing_category));

        assert!(repo.get_categories_for_manga(manga.id).await.unwrap().is_empty());
        assert_eq!(repo.get_library_mangas().await.unwrap()[0].category, None);
    }

    #[tokio::test]
    async fn test_batch_association_is_all_or_nothing() {
        let repo = repository().await;
        let manga = repo.insert_manga(&favorite("one")).await.unwrap();
        let category = repo.insert_category(&NewCategory::new("Reading")).await.unwrap();
        let edges = [
            NewMangaCategory::new(&manga, &category),
            (manga.id, CategoryId::new(1000).unwrap()).into(),
        ];
        let err = repo.insert_manga_categories(&edges).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CategoryNotFound(_)));
        assert!(repo.get_categories_for_manga(manga.id).await.unwrap().is_empty());

        let inserted = repo.insert_manga_categories(&edges[..1]).await.unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].category_id, category.id);
        assert!(repo.insert_manga_categories(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_category_is_created_only_once() {
        let repo = repository().await;
        let created = repo.insert_default_category().await.unwrap().unwrap();
        assert_eq!(created.name, DEFAULT_CATEGORY_NAME);
        assert!(repo.insert_default_category().await.unwrap().is_none());
        assert_eq!(repo.get_categories().await.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn test_default_category_is_skipped_when_named_categories_exist() {
        let repo = repository().await;
        repo.insert_category(&NewCategory::new("Reading")).await.unwrap();
        assert!(repo.insert_default_category().await.unwrap().is_none());
        let names = repo.get_categories().await.unwrap().into_iter().map(|c| c.name).collect::<Vec<_>>();
        assert_eq!(names, vec!["Reading"]);
    }

    #[tokio::test]
    async fn test_categories_sort_by_order_then_creation() {
        let repo = repository().await;
        let later = repo.insert_category(&NewCategory { order: 1, ..NewCategory::new("Later") }).await.unwrap();
        let reading = repo.insert_category(&NewCategory::new("Reading")).await.unwrap();
        let hold = repo.insert_category(&NewCategory::new("Hold")).await.unwrap();
        assert_eq!(repo.get_categories().await.unwrap(), vec![reading, hold, later]);
    }

    #[tokio::test]
    async fn test_get_category_by_id() {
        let repo = repository().await;
        let reading = repo.insert_category(&NewCategory::new("Reading")).await.unwrap();
        assert_eq!(repo.get_category(reading.id).await.unwrap(), Some(reading));
        assert_eq!(repo.get_category(CategoryId::new(404).unwrap()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_category_is_not_stored() {
        let repo = repository().await;
        let err = repo.insert_category(&NewCategory::new("  ")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
        assert!(repo.get_categories().await.unwrap().is_empty());
    }
}
