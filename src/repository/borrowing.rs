//! Borrowing requests repository.
//!
//! Writes run in a single transaction. The requestor row is locked while the
//! monthly quota is re-counted and the requested book rows are locked while
//! their availability is checked and decremented, so two concurrent
//! submissions can neither exceed the quota nor take the last copy twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrowing::{
            unavailable_ids, BorrowingRequest, BorrowingRequestQuery, BorrowingRequestRow,
            BorrowingRequestSummary, BorrowingRequestView, MonthWindow, NewBorrowingRequest,
            RequestStatus, StatusInput, StatusUpdateOutcome, SubmitOutcome,
        },
        pagination::Pagination,
        User,
    },
};

use super::{contains_pattern, BorrowingStore};

/// Request row with requestor and approver usernames
#[derive(Debug, FromRow)]
struct NamedRequestRow {
    id: i32,
    requestor: String,
    approver: Option<String>,
    status: i16,
    date_requested: DateTime<Utc>,
}

impl NamedRequestRow {
    fn status(&self) -> AppResult<RequestStatus> {
        RequestStatus::try_from(self.status).map_err(AppError::Internal)
    }

    fn into_summary(self) -> AppResult<BorrowingRequestSummary> {
        Ok(BorrowingRequestSummary {
            status: self.status()?,
            id: self.id,
            requestor: self.requestor,
            approver: self.approver,
            date_requested: self.date_requested.date_naive(),
        })
    }
}

/// Book joined to the request that references it
#[derive(Debug, FromRow)]
struct RequestedBookRow {
    request_id: i32,
    #[sqlx(flatten)]
    book: Book,
}

#[derive(Clone)]
pub struct BorrowingRepository {
    pool: Pool<Postgres>,
}

impl BorrowingRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn count_in_window<'e, E>(
        executor: E,
        requestor_id: i32,
        window: MonthWindow,
    ) -> AppResult<i64>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM borrowing_requests
            WHERE requestor_id = $1
              AND status <> $2
              AND date_requested >= $3
              AND date_requested < $4
            "#,
        )
        .bind(requestor_id)
        .bind(i16::from(RequestStatus::Rejected))
        .bind(window.start)
        .bind(window.end)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    /// Lock the requested books that still have a copy and return their ids
    async fn lock_available_books(
        tx: &mut Transaction<'_, Postgres>,
        book_ids: &[i32],
    ) -> AppResult<Vec<i32>> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT id FROM books
            WHERE id = ANY($1) AND available > 0
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(book_ids)
        .fetch_all(&mut **tx)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl BorrowingStore for BorrowingRepository {
    async fn find_user(&self, user_id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.role_id, r.name AS role
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn count_active_requests(&self, requestor_id: i32, window: MonthWindow) -> AppResult<i64> {
        Self::count_in_window(&self.pool, requestor_id, window).await
    }

    async fn available_book_ids(&self, book_ids: &[i32]) -> AppResult<Vec<i32>> {
        let ids: Vec<i32> =
            sqlx::query_scalar("SELECT id FROM books WHERE id = ANY($1) AND available > 0")
                .bind(book_ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    async fn create_request(&self, request: &NewBorrowingRequest) -> AppResult<SubmitOutcome> {
        let mut tx = self.pool.begin().await?;

        // Serialize submissions of the same requestor
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(request.requestor_id)
            .execute(&mut *tx)
            .await?;

        let active = Self::count_in_window(&mut *tx, request.requestor_id, request.window).await?;
        if active >= request.monthly_limit {
            tx.rollback().await?;
            return Ok(SubmitOutcome::QuotaExceeded);
        }

        let available = Self::lock_available_books(&mut tx, &request.book_ids).await?;
        let missing = unavailable_ids(&request.book_ids, &available);
        if !missing.is_empty() {
            tx.rollback().await?;
            return Ok(SubmitOutcome::Unavailable(missing));
        }

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO borrowing_requests (requestor_id, approver_id, status, date_requested)
            VALUES ($1, NULL, $2, $3)
            RETURNING id
            "#,
        )
        .bind(request.requestor_id)
        .bind(i16::from(RequestStatus::Waiting))
        .bind(request.requested_at)
        .fetch_one(&mut *tx)
        .await?;

        let decremented = sqlx::query(
            "UPDATE books SET available = available - 1 WHERE id = ANY($1) AND available > 0",
        )
        .bind(&request.book_ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if decremented != request.book_ids.len() as u64 {
            tx.rollback().await?;
            return Err(AppError::Internal(format!(
                "Reserved {} of {} locked books",
                decremented,
                request.book_ids.len()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO borrowing_request_details (request_id, book_id)
            SELECT $1, UNNEST($2::int[])
            "#,
        )
        .bind(id)
        .bind(&request.book_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SubmitOutcome::Created(id))
    }

    async fn get_request(&self, id: i32) -> AppResult<Option<BorrowingRequest>> {
        let row = sqlx::query_as::<_, BorrowingRequestRow>(
            r#"
            SELECT id, requestor_id, approver_id, status, date_requested
            FROM borrowing_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let book_ids: Vec<i32> = sqlx::query_scalar(
            "SELECT book_id FROM borrowing_request_details WHERE request_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        row.into_request(book_ids)
            .map(Some)
            .map_err(AppError::Internal)
    }

    async fn update_status(
        &self,
        id: i32,
        status: RequestStatus,
        approver_id: i32,
    ) -> AppResult<StatusUpdateOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i16> =
            sqlx::query_scalar("SELECT status FROM borrowing_requests WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(StatusUpdateOutcome::NotFound);
        };
        let current = RequestStatus::try_from(current).map_err(AppError::Internal)?;
        if !current.can_transition_to(status) {
            tx.rollback().await?;
            return Ok(StatusUpdateOutcome::NotWaiting);
        }

        sqlx::query("UPDATE borrowing_requests SET status = $1, approver_id = $2 WHERE id = $3")
            .bind(i16::from(status))
            .bind(approver_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if status == RequestStatus::Rejected {
            sqlx::query(
                r#"
                UPDATE books b
                SET available = b.available + 1
                FROM borrowing_request_details d
                WHERE d.request_id = $1 AND d.book_id = b.id
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(StatusUpdateOutcome::Updated)
    }

    async fn list_by_requestor(
        &self,
        requestor_id: i32,
        window: MonthWindow,
    ) -> AppResult<Vec<BorrowingRequestView>> {
        let rows = sqlx::query_as::<_, NamedRequestRow>(
            r#"
            SELECT r.id, req.username AS requestor, app.username AS approver,
                   r.status, r.date_requested
            FROM borrowing_requests r
            JOIN users req ON req.id = r.requestor_id
            LEFT JOIN users app ON app.id = r.approver_id
            WHERE r.requestor_id = $1
              AND r.date_requested >= $2
              AND r.date_requested < $3
            ORDER BY r.date_requested, r.id
            "#,
        )
        .bind(requestor_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let request_ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let books = sqlx::query_as::<_, RequestedBookRow>(
            r#"
            SELECT d.request_id, b.id, b.title, b.author, b.isbn, b.publication_date,
                   b.quantity, b.available, b.category_id, c.name AS category
            FROM borrowing_request_details d
            JOIN books b ON b.id = d.book_id
            LEFT JOIN categories c ON c.id = b.category_id
            WHERE d.request_id = ANY($1)
            ORDER BY d.id
            "#,
        )
        .bind(&request_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> AppResult<BorrowingRequestView> {
                let book_requested = books
                    .iter()
                    .filter(|b| b.request_id == row.id)
                    .map(|b| b.book.clone())
                    .collect();
                Ok(BorrowingRequestView {
                    status: row.status()?,
                    id: row.id,
                    requestor: row.requestor,
                    approver: row.approver,
                    date_requested: row.date_requested.date_naive(),
                    book_requested,
                })
            })
            .collect()
    }

    async fn search(
        &self,
        query: &BorrowingRequestQuery,
    ) -> AppResult<(Vec<BorrowingRequestSummary>, i64)> {
        let page = Pagination::new(query.page_index, query.page_size);
        let pattern = contains_pattern(query.search_requestor.as_deref());
        let status = query
            .search_status
            .as_ref()
            .and_then(StatusInput::status)
            .map(i16::from);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM borrowing_requests r
            JOIN users req ON req.id = r.requestor_id
            WHERE ($1::text IS NULL OR LOWER(req.username) LIKE $1 ESCAPE '\')
              AND ($2::smallint IS NULL OR r.status = $2)
            "#,
        )
        .bind(&pattern)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, NamedRequestRow>(
            r#"
            SELECT r.id, req.username AS requestor, app.username AS approver,
                   r.status, r.date_requested
            FROM borrowing_requests r
            JOIN users req ON req.id = r.requestor_id
            LEFT JOIN users app ON app.id = r.approver_id
            WHERE ($1::text IS NULL OR LOWER(req.username) LIKE $1 ESCAPE '\')
              AND ($2::smallint IS NULL OR r.status = $2)
            ORDER BY r.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&pattern)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(NamedRequestRow::into_summary)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((items, total))
    }
}
