//! Book catalog service

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        pagination::{PaginatedResponse, Pagination},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn search(&self, query: &BookQuery) -> AppResult<PaginatedResponse<Book>> {
        let page = Pagination::new(query.page_index, query.page_size);
        let (books, total) = self.repository.books.search(query).await?;
        Ok(page.into_response(books, total))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        self.repository
            .books
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found!".to_string()))
    }

    /// Create a book; every copy starts available
    pub async fn create(&self, book: CreateBook) -> AppResult<Book> {
        self.ensure_isbn_free(&book.isbn, None).await?;
        self.ensure_category(book.category_id).await?;

        let id = self.repository.books.create(&book).await?;
        tracing::info!("Book {} created with ISBN {}", id, book.isbn);
        self.get_by_id(id).await
    }

    pub async fn update(&self, id: i32, book: UpdateBook) -> AppResult<()> {
        self.get_by_id(id).await?;
        self.ensure_isbn_free(&book.isbn, Some(id)).await?;
        self.ensure_category(book.category_id).await?;

        self.repository.books.update(id, &book).await
    }

    /// Delete a book no borrowing request refers to
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.get_by_id(id).await?;
        if self.repository.books.is_requested(id).await? {
            return Err(AppError::BusinessRule(
                "Cannot delete book while copies are borrowed!".to_string(),
            ));
        }
        self.repository.books.delete(id).await
    }

    async fn ensure_isbn_free(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<()> {
        match self.repository.books.find_id_by_isbn(isbn).await? {
            Some(existing) if Some(existing) != exclude_id => Err(AppError::Conflict(
                "A book with this ISBN already exists!".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn ensure_category(&self, category_id: i32) -> AppResult<()> {
        if self.repository.categories.find_by_id(category_id).await?.is_none() {
            return Err(AppError::BadRequest("Book category does not exist!".to_string()));
        }
        Ok(())
    }
}
