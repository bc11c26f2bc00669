//! Books repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        borrowing::RequestStatus,
        pagination::Pagination,
    },
};

use super::contains_pattern;

const DUPLICATE_ISBN: &str = "A book with this ISBN already exists!";

const BOOK_SELECT: &str = r#"
    SELECT b.id, b.title, b.author, b.isbn, b.publication_date,
           b.quantity, b.available, b.category_id, c.name AS category
    FROM books b
    LEFT JOIN categories c ON c.id = b.category_id
"#;

const BOOK_FILTER: &str = r#"
    WHERE ($1::int IS NULL OR b.category_id = $1)
      AND ($2::text IS NULL
           OR LOWER(b.title) LIKE $2 ESCAPE '\'
           OR LOWER(b.author) LIKE $2 ESCAPE '\'
           OR LOWER(b.isbn) LIKE $2 ESCAPE '\')
      AND ($3::bool IS NULL
           OR ($3 AND b.available > 0)
           OR (NOT $3 AND b.available = 0))
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Filtered, paginated book list ordered by id
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = Pagination::new(query.page_index, query.page_size);
        let pattern = contains_pattern(query.search_string.as_deref());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM books b {}",
            BOOK_FILTER
        ))
        .bind(query.category_id)
        .bind(&pattern)
        .bind(query.is_available)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(&format!(
            "{} {} ORDER BY b.id LIMIT $4 OFFSET $5",
            BOOK_SELECT, BOOK_FILTER
        ))
        .bind(query.category_id)
        .bind(&pattern)
        .bind(query.is_available)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!("{} WHERE b.id = $1", BOOK_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    /// Id of the book holding this ISBN, if any
    pub async fn find_id_by_isbn(&self, isbn: &str) -> AppResult<Option<i32>> {
        let id = sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn create(&self, book: &CreateBook) -> AppResult<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO books (title, author, isbn, publication_date, quantity, available, category_id)
            VALUES ($1, $2, $3, $4, $5, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.publication_date)
        .bind(book.quantity)
        .bind(book.category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, DUPLICATE_ISBN))?;
        Ok(id)
    }

    /// Replace a book's fields.
    ///
    /// The book row stays locked while the copies held by Waiting requests are
    /// counted, so a later rejection can always put its copies back.
    pub async fn update(&self, id: i32, book: &UpdateBook) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let reserved: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM borrowing_request_details d
            JOIN borrowing_requests r ON r.id = d.request_id
            WHERE d.book_id = $1 AND r.status = $2
            "#,
        )
        .bind(id)
        .bind(i16::from(RequestStatus::Waiting))
        .fetch_one(&mut *tx)
        .await?;

        if !book.leaves_room_for(reserved) {
            tx.rollback().await?;
            return Err(AppError::BusinessRule(format!(
                "Available copies cannot exceed quantity minus the {} reserved by waiting requests!",
                reserved
            )));
        }

        sqlx::query(
            r#"
            UPDATE books
            SET title = $1, author = $2, isbn = $3, publication_date = $4,
                quantity = $5, available = $6, category_id = $7
            WHERE id = $8
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.publication_date)
        .bind(book.quantity)
        .bind(book.available)
        .bind(book.category_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, DUPLICATE_ISBN))?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Any book filed under this category
    pub async fn category_has_books(&self, category_id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE category_id = $1)")
                .bind(category_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Book referenced by at least one borrowing request
    pub async fn is_requested(&self, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrowing_request_details WHERE book_id = $1)",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
