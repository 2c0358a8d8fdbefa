//! Blocking facade over the repository.
//!
//! A [`Library`] is an explicitly owned store instance: open it, hand
//! references to whoever needs it, then [`close`](Library::close) it. Every
//! operation returns a [`Pending`] completion handle instead of running
//! straight away.

use crate::error::{ErrorKind, Result};
use crate::models::{Category, CategoryId, Manga, MangaCategory, MangaId, NewCategory, NewManga, NewMangaCategory};
use crate::{Database, Repository};
use exn::ResultExt;
use shelf_asyncutils::{Blocking, BoxBlocking};
use shelf_config::{Config, RuntimeConfig};
use std::future::{Future, IntoFuture};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::instrument;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Completion handle for a store operation.
///
/// Call [`execute_as_blocking`](Self::execute_as_blocking) from synchronous
/// code, or `.await` it from async code. Either way the result is fully
/// materialized; nothing is streamed.
#[must_use = "store operations do nothing until awaited or executed"]
pub struct Pending<T> {
    inner: BoxBlocking<Result<T>>,
}
impl<T> Pending<T> {
    /// Block the calling thread until the operation completes.
    ///
    /// Returns [`ErrorKind::Timeout`] if the library was opened with a
    /// blocking timeout and a read didn't finish in time. Writes are never
    /// abandoned mid-flight: they give up inside SQLite instead, once the
    /// database lock can't be taken within the same limit, and fail with
    /// [`ErrorKind::Database`] having applied nothing.
    ///
    /// # Panics
    /// Panics if called from within an async runtime. Await the handle instead.
    pub fn execute_as_blocking(self) -> Result<T> {
        self.inner.execute_as_blocking().or_raise(|| ErrorKind::Timeout)?
    }
}
impl<T> IntoFuture for Pending<T> {
    type Output = Result<T>;
    type IntoFuture = BoxBlocking<Result<T>>;
    fn into_future(self) -> Self::IntoFuture {
        self.inner
    }
}

/// A manga library store.
///
/// Owns the runtime that drives the database as well as the connection pool
/// itself. The library is `Send + Sync`; share it by reference between
/// threads rather than opening it twice.
///
/// Dropping (or closing) a library from inside an async context panics, as
/// it shuts down its own runtime.
pub struct Library {
    runtime: Runtime,
    database: Database,
    repo: Repository,
    timeout: Option<Duration>,
}

impl Library {
    /// Open (creating if needed) the library described by `config`.
    #[instrument(level = "debug", skip_all)]
    pub fn open(config: &Config) -> Result<Self> {
        let runtime = Self::runtime(&config.runtime)?;
        let mut database = config.database.clone();
        if let Some(limit) = config.runtime.blocking_timeout_ms {
            database.busy_timeout_ms = database.busy_timeout_ms.min(limit);
        }
        let database = runtime.block_on(Database::connect(&database))?;
        Ok(Self::assemble(runtime, database, config.runtime.blocking_timeout()))
    }

    /// Open a throwaway library held entirely in memory.
    pub fn open_in_memory() -> Result<Self> {
        let config = RuntimeConfig::default();
        let runtime = Self::runtime(&config)?;
        let database = runtime.block_on(Database::connect_in_memory())?;
        Ok(Self::assemble(runtime, database, config.blocking_timeout()))
    }

    fn runtime(config: &RuntimeConfig) -> Result<Runtime> {
        // Multi-threaded so that handles can block on it from any thread
        // while its workers keep driving I/O and timers.
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("shelf-store")
            .enable_all()
            .build()
            .or_raise(|| ErrorKind::Runtime)
    }

    fn assemble(runtime: Runtime, database: Database, timeout: Option<Duration>) -> Self {
        let repo = Repository::from(&database);
        Self { runtime, database, repo, timeout }
    }

    /// Override how long blocking reads may wait. `None` waits forever.
    ///
    /// Writes stay bounded by the busy timeout the database was opened with.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The async repository backing this library.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Close the connection pool and shut the runtime down.
    pub fn close(self) {
        let Self { runtime, database, .. } = self;
        runtime.block_on(database.close());
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
    }

    fn read<T, F, Fut>(&self, operation: F) -> Pending<T>
    where
        F: FnOnce(Repository) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let future = operation(self.repo.clone());
        let inner = Blocking::new(self.runtime.handle().clone(), future).with_timeout(self.timeout).boxed();
        Pending { inner }
    }

    // A dropped sqlx future doesn't cancel the statement it already handed to
    // SQLite, so writes must run to completion once started.
    fn write<T, F, Fut>(&self, operation: F) -> Pending<T>
    where
        F: FnOnce(Repository) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let future = operation(self.repo.clone());
        let inner = Blocking::new(self.runtime.handle().clone(), future).boxed();
        Pending { inner }
    }

    // =========================================================================
    // Record store
    // =========================================================================

    pub fn insert_manga(&self, manga: &NewManga) -> Pending<Manga> {
        let manga = manga.clone();
        self.write(|repo| async move { repo.insert_manga(&manga).await })
    }

    pub fn get_mangas(&self) -> Pending<Vec<Manga>> {
        self.read(|repo| async move { repo.get_mangas().await })
    }

    pub fn get_manga(&self, id: MangaId) -> Pending<Option<Manga>> {
        self.read(move |repo| async move { repo.get_manga(id).await })
    }

    pub fn get_manga_by_url(&self, url: impl Into<String>, source: i64) -> Pending<Option<Manga>> {
        let url = url.into();
        self.read(move |repo| async move { repo.get_manga_by_url(url, source).await })
    }

    pub fn set_manga_favorite(&self, id: MangaId, favorite: bool) -> Pending<()> {
        self.write(move |repo| async move { repo.set_manga_favorite(id, favorite).await })
    }

    pub fn insert_category(&self, category: &NewCategory) -> Pending<Category> {
        let category = category.clone();
        self.write(|repo| async move { repo.insert_category(&category).await })
    }

    /// Create the "Default" category if, and only if, there are no
    /// categories yet. Resolves to `None` when nothing was created.
    pub fn insert_default_category(&self) -> Pending<Option<Category>> {
        self.write(|repo| async move { repo.insert_default_category().await })
    }

    pub fn get_categories(&self) -> Pending<Vec<Category>> {
        self.read(|repo| async move { repo.get_categories().await })
    }

    pub fn get_category(&self, id: CategoryId) -> Pending<Option<Category>> {
        self.read(move |repo| async move { repo.get_category(id).await })
    }

    // =========================================================================
    // Associations
    // =========================================================================

    pub fn insert_manga_category(&self, edge: &NewMangaCategory) -> Pending<MangaCategory> {
        let edge = *edge;
        self.write(move |repo| async move { repo.insert_manga_category(&edge).await })
    }

    pub fn insert_manga_categories(&self, edges: &[NewMangaCategory]) -> Pending<Vec<MangaCategory>> {
        let edges = edges.to_vec();
        self.write(|repo| async move { repo.insert_manga_categories(&edges).await })
    }

    pub fn get_categories_for_manga(&self, id: MangaId) -> Pending<Vec<Category>> {
        self.read(move |repo| async move { repo.get_categories_for_manga(id).await })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Favorite manga, each annotated with its category.
    pub fn get_library_mangas(&self) -> Pending<Vec<Manga>> {
        self.read(|repo| async move { repo.get_library_mangas().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_is_shareable_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Library>();
    }

    #[test]
    fn test_handles_are_lazy() {
        let library = Library::open_in_memory().unwrap();
        // Built but never executed: nothing may be written.
        drop(library.insert_category(&NewCategory::new("Reading")));
        assert!(library.get_categories().execute_as_blocking().unwrap().is_empty());
        library.close();
    }

    #[test]
    fn test_read_timeout_surfaces_as_error() {
        let library = Library::open_in_memory().unwrap().with_timeout(Some(Duration::from_millis(10)));
        let pending = library.read(|_repo| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let err = pending.execute_as_blocking().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Timeout));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_writes_run_to_completion_past_timeout() {
        let library = Library::open_in_memory().unwrap().with_timeout(Some(Duration::from_millis(10)));
        let pending = library.write(|repo| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            repo.insert_category(&NewCategory::new("Reading")).await
        });
        let category = pending.execute_as_blocking().unwrap();
        assert_eq!(library.get_categories().execute_as_blocking().unwrap(), vec![category]);
        library.close();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_handles_can_be_awaited() {
        let library = tokio::task::spawn_blocking(|| Library::open_in_memory().unwrap()).await.unwrap();
        let category = library.insert_category(&NewCategory::new("Reading")).await.unwrap();
        assert_eq!(library.get_categories().await.unwrap(), vec![category]);
        // The library owns a runtime, which must not be dropped in async context.
        tokio::task::spawn_blocking(move || library.close()).await.unwrap();
    }
}
