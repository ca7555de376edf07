use std::{str::FromStr, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, SqlitePool,
};
use utoipa::ToSchema;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("There is no book with an isbn '{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema, FromRow)]
pub struct Book {
    pub isbn: String,
    pub amazon_url: String,
    pub author: String,
    pub language: String,
    pub pages: i64,
    pub publisher: String,
    pub title: String,
    pub year: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection url, e.g. `sqlite://books.db` or `sqlite::memory:`.
    pub url: String,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            url: url.into(),
            max_connections,
        }
    }

    fn default_max_connections() -> u32 {
        5
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

const COLUMNS: &str = "isbn, amazon_url, author, language, pages, publisher, title, year";

/// Data access for the `books` table.
#[derive(Debug, Clone)]
pub struct BookStore {
    pool: SqlitePool,
}

impl BookStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `config` and makes sure the `books` table exists.
    #[tracing::instrument(skip_all, fields(url = %config.url))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        // An in-memory database lives only as long as its connection.
        let pool_options = match config.is_in_memory() {
            true => SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>),
            false => SqlitePoolOptions::new().max_connections(config.max_connections),
        };

        let pool = pool_options.connect_with(options).await?;

        let store = Self::new(pool);
        store.migrate().await?;

        tracing::info!("Database ready");

        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                isbn TEXT PRIMARY KEY,
                amazon_url TEXT NOT NULL,
                author TEXT NOT NULL,
                language TEXT NOT NULL,
                pages INTEGER NOT NULL,
                publisher TEXT NOT NULL,
                title TEXT NOT NULL,
                year INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        let books = sqlx::query_as::<_, Book>(&format!("SELECT {COLUMNS} FROM books"))
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(count = books.len(), "Listed books");

        Ok(books)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_isbn(&self, isbn: &str) -> Result<Book, StoreError> {
        sqlx::query_as::<_, Book>(&format!("SELECT {COLUMNS} FROM books WHERE isbn = ?"))
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(isbn.to_string()))
    }

    /// Inserts `book`. A duplicate isbn fails with the database's constraint error.
    #[tracing::instrument(skip_all, fields(isbn = %book.isbn))]
    pub async fn create(&self, book: &Book) -> Result<Book, StoreError> {
        let created = sqlx::query_as::<_, Book>(&format!(
            "INSERT INTO books ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
        ))
        .bind(&book.isbn)
        .bind(&book.amazon_url)
        .bind(&book.author)
        .bind(&book.language)
        .bind(book.pages)
        .bind(&book.publisher)
        .bind(&book.title)
        .bind(book.year)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created book");

        Ok(created)
    }

    /// Overwrites every field of the book stored under `isbn`.
    ///
    /// `isbn` is the key and is never changed; `book.isbn` is ignored. The lookup and
    /// the write are one statement, so no other writer can interleave between them.
    #[tracing::instrument(skip(self, book))]
    pub async fn update(&self, isbn: &str, book: &Book) -> Result<Book, StoreError> {
        let updated = sqlx::query_as::<_, Book>(&format!(
            "UPDATE books SET amazon_url = ?, author = ?, language = ?, pages = ?, publisher = ?, title = ?, year = ? \
             WHERE isbn = ? RETURNING {COLUMNS}"
        ))
        .bind(&book.amazon_url)
        .bind(&book.author)
        .bind(&book.language)
        .bind(book.pages)
        .bind(&book.publisher)
        .bind(&book.title)
        .bind(book.year)
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(isbn.to_string()))?;

        tracing::debug!("Updated book");

        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, isbn: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM books WHERE isbn = ? RETURNING isbn")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(isbn.to_string()))?;

        tracing::debug!("Removed book");

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) async fn memory_store() -> BookStore {
        BookStore::connect(&DatabaseConfig::new("sqlite::memory:", 1))
            .await
            .expect("In-memory database must open")
    }

    pub(crate) fn test_book() -> Book {
        Book {
            isbn: "test_isbn".to_string(),
            amazon_url: "test_url".to_string(),
            author: "test_author".to_string(),
            language: "english".to_string(),
            pages: 200,
            publisher: "test_publisher".to_string(),
            title: "test_title".to_string(),
            year: 1990,
        }
    }

    #[tokio::test]
    async fn create_then_get_returns_same_book() {
        let store = memory_store().await;
        let book = test_book();

        let created = store.create(&book).await.unwrap();
        assert_eq!(created, book);

        let fetched = store.get_by_isbn("test_isbn").await.unwrap();
        assert_eq!(fetched, book);
    }

    #[tokio::test]
    async fn list_all_returns_every_book() {
        let store = memory_store().await;
        assert!(store.list_all().await.unwrap().is_empty());

        let first = test_book();
        let second = Book {
            isbn: "test_isbn2".to_string(),
            ..test_book()
        };

        store.create(&first).await.unwrap();
        store.create(&second).await.unwrap();

        let books = store.list_all().await.unwrap();
        assert_eq!(books.len(), 2);
        assert!(books.contains(&first));
        assert!(books.contains(&second));
    }

    #[tokio::test]
    async fn get_missing_book_is_not_found() {
        let store = memory_store().await;

        let err = store.get_by_isbn("wrong_isbn").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref isbn) if isbn == "wrong_isbn"));
        assert_eq!(err.to_string(), "There is no book with an isbn 'wrong_isbn");
    }

    #[tokio::test]
    async fn duplicate_isbn_is_a_database_error() {
        let store = memory_store().await;
        store.create(&test_book()).await.unwrap();

        let err = store.create(&test_book()).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn update_overwrites_fields_but_keeps_isbn() {
        let store = memory_store().await;
        store.create(&test_book()).await.unwrap();

        let changes = Book {
            isbn: "ignored_isbn".to_string(),
            amazon_url: "new_url".to_string(),
            author: "new_author".to_string(),
            language: "german".to_string(),
            pages: 321,
            publisher: "new_publisher".to_string(),
            title: "new_title".to_string(),
            year: 2001,
        };

        let updated = store.update("test_isbn", &changes).await.unwrap();
        let expected = Book {
            isbn: "test_isbn".to_string(),
            ..changes
        };

        assert_eq!(updated, expected);
        assert_eq!(store.get_by_isbn("test_isbn").await.unwrap(), expected);
        assert!(matches!(
            store.get_by_isbn("ignored_isbn").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_missing_book_is_not_found() {
        let store = memory_store().await;

        let err = store.update("wrong_isbn", &test_book()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    async fn file_store(dir: &tempfile::TempDir) -> BookStore {
        let url = format!("sqlite://{}", dir.path().join("books.db").display());

        BookStore::connect(&DatabaseConfig::new(url, 5))
            .await
            .expect("File database must open")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_never_fail_on_locking() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir).await;
        store.create(&test_book()).await.unwrap();

        let tasks = (0..16)
            .map(|pages| {
                let store = store.clone();

                tokio::spawn(async move {
                    let book = Book {
                        pages,
                        ..test_book()
                    };

                    store.update("test_isbn", &book).await
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            let result = task.await.unwrap();
            assert!(result.is_ok(), "update failed: {result:?}");
        }

        let pages = store.get_by_isbn("test_isbn").await.unwrap().pages;
        assert!((0..16).contains(&pages));

        store.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_removes_delete_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir).await;
        store.create(&test_book()).await.unwrap();

        let tasks = (0..8)
            .map(|_| {
                let store = store.clone();

                tokio::spawn(async move { store.remove("test_isbn").await })
            })
            .collect::<Vec<_>>();

        let mut removed = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => removed += 1,
                Err(StoreError::NotFound(_)) => {}
                Err(err) => panic!("remove failed: {err:?}"),
            }
        }

        assert_eq!(removed, 1);

        store.close().await;
    }

    #[tokio::test]
    async fn remove_deletes_the_row() {
        let store = memory_store().await;
        store.create(&test_book()).await.unwrap();

        store.remove("test_isbn").await.unwrap();

        assert!(matches!(
            store.get_by_isbn("test_isbn").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.remove("test_isbn").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
