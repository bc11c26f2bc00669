//! Repository layer for database operations

pub mod books;
pub mod borrowing;
pub mod categories;
pub mod users;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        borrowing::{
            BorrowingRequest, BorrowingRequestQuery, BorrowingRequestSummary, BorrowingRequestView,
            MonthWindow, NewBorrowingRequest, RequestStatus, StatusUpdateOutcome, SubmitOutcome,
        },
        User,
    },
};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub categories: categories::CategoriesRepository,
    pub users: users::UsersRepository,
    pub borrowing: borrowing::BorrowingRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            borrowing: borrowing::BorrowingRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

/// `%needle%` for a case-insensitive `LIKE ... ESCAPE '\'` match.
///
/// Wildcards in the needle match literally. Empty needles mean no filter.
pub(crate) fn contains_pattern(needle: Option<&str>) -> Option<String> {
    let needle = needle.filter(|s| !s.is_empty())?;
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}

/// Persistence port of the borrowing workflow.
///
/// `create_request` and `update_status` must each commit as one unit: the
/// quota re-check, availability check, decrements and detail rows together,
/// and the status change together with any availability restore.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowingStore: Send + Sync {
    /// User with role resolved, if any
    async fn find_user(&self, user_id: i32) -> AppResult<Option<User>>;

    /// Non-rejected requests of `requestor_id` dated inside `window`
    async fn count_active_requests(&self, requestor_id: i32, window: MonthWindow) -> AppResult<i64>;

    /// Subset of `book_ids` that exist with at least one available copy
    async fn available_book_ids(&self, book_ids: &[i32]) -> AppResult<Vec<i32>>;

    async fn create_request(&self, request: &NewBorrowingRequest) -> AppResult<SubmitOutcome>;

    async fn get_request(&self, id: i32) -> AppResult<Option<BorrowingRequest>>;

    async fn update_status(
        &self,
        id: i32,
        status: RequestStatus,
        approver_id: i32,
    ) -> AppResult<StatusUpdateOutcome>;

    async fn list_by_requestor(
        &self,
        requestor_id: i32,
        window: MonthWindow,
    ) -> AppResult<Vec<BorrowingRequestView>>;

    async fn search(
        &self,
        query: &BorrowingRequestQuery,
    ) -> AppResult<(Vec<BorrowingRequestSummary>, i64)>;
}
