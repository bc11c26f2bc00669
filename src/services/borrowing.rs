//! Borrowing request workflow: submission, listing, quota and approval

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrowing::{
            duplicate_ids, unavailable_ids, BorrowingError, BorrowingRequestQuery,
            BorrowingRequestSummary, BorrowingRequestView, MonthWindow, MonthlyRequestCount,
            NewBorrowingRequest, RequestStatus, StatusInput, StatusUpdateOutcome, SubmitOutcome,
            MAX_BOOKS_PER_REQUEST, MIN_BOOKS_PER_REQUEST, MONTHLY_REQUEST_LIMIT,
        },
        pagination::{PaginatedResponse, Pagination},
    },
    repository::BorrowingStore,
    services::clock::Clock,
};

#[derive(Clone)]
pub struct BorrowingService {
    store: Arc<dyn BorrowingStore>,
    clock: Arc<dyn Clock>,
}

impl BorrowingService {
    pub fn new(store: Arc<dyn BorrowingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn current_window(&self) -> MonthWindow {
        MonthWindow::containing(self.clock.now())
    }

    /// Requestor must exist and hold the NORMAL_USER role
    async fn ensure_requestor(&self, requestor_id: i32) -> AppResult<()> {
        match self.store.find_user(requestor_id).await? {
            Some(user) if user.is_normal_user() => Ok(()),
            _ => Err(BorrowingError::RequestorNotAuthorized.into()),
        }
    }

    /// Submit a new request in Waiting status and reserve one copy of each book
    pub async fn submit(&self, requestor_id: i32, book_ids: Vec<i32>) -> AppResult<i32> {
        self.ensure_requestor(requestor_id).await?;

        let now = self.clock.now();
        let window = MonthWindow::containing(now);

        let active = self.store.count_active_requests(requestor_id, window).await?;
        if active >= MONTHLY_REQUEST_LIMIT {
            tracing::debug!("User {} reached the monthly limit ({} active)", requestor_id, active);
            return Err(BorrowingError::MonthlyLimitExceeded.into());
        }

        if !(MIN_BOOKS_PER_REQUEST..=MAX_BOOKS_PER_REQUEST).contains(&book_ids.len()) {
            return Err(BorrowingError::InvalidBookCount.into());
        }

        // Unavailable ids are reported once each, so a repeated missing id fails here
        let available = self.store.available_book_ids(&book_ids).await?;
        let missing = unavailable_ids(&book_ids, &available);
        if !missing.is_empty() {
            tracing::debug!("User {} requested unavailable books {:?}", requestor_id, missing);
            return Err(BorrowingError::UnavailableBooks(missing).into());
        }

        let duplicates = duplicate_ids(&book_ids);
        if !duplicates.is_empty() {
            return Err(BorrowingError::DuplicateBooks(duplicates).into());
        }

        let request = NewBorrowingRequest {
            requestor_id,
            book_ids,
            requested_at: now,
            window,
            monthly_limit: MONTHLY_REQUEST_LIMIT,
        };

        // Quota and availability are checked again under lock
        match self.store.create_request(&request).await? {
            SubmitOutcome::Created(id) => {
                tracing::info!(
                    "Borrowing request {} submitted by user {} for books {:?}",
                    id,
                    requestor_id,
                    request.book_ids
                );
                Ok(id)
            }
            SubmitOutcome::QuotaExceeded => {
                tracing::warn!("Monthly limit reached concurrently for user {}", requestor_id);
                Err(BorrowingError::MonthlyLimitExceeded.into())
            }
            SubmitOutcome::Unavailable(ids) => {
                tracing::warn!("Books {:?} taken concurrently", ids);
                Err(BorrowingError::UnavailableBooks(ids).into())
            }
        }
    }

    /// Requests of `requestor_id` dated this month, with their books
    pub async fn list_by_requestor(&self, requestor_id: i32) -> AppResult<Vec<BorrowingRequestView>> {
        self.ensure_requestor(requestor_id).await?;
        self.store
            .list_by_requestor(requestor_id, self.current_window())
            .await
    }

    /// Non-rejected requests of `requestor_id` dated this month
    pub async fn monthly_count(&self, requestor_id: i32) -> AppResult<MonthlyRequestCount> {
        self.ensure_requestor(requestor_id).await?;
        let count = self
            .store
            .count_active_requests(requestor_id, self.current_window())
            .await?;
        Ok(MonthlyRequestCount {
            count,
            limit: MONTHLY_REQUEST_LIMIT,
        })
    }

    pub async fn list_all(
        &self,
        query: &BorrowingRequestQuery,
    ) -> AppResult<PaginatedResponse<BorrowingRequestSummary>> {
        if matches!(query.search_status, Some(StatusInput::Unknown(_))) {
            return Err(BorrowingError::InvalidStatus.into());
        }
        let page = Pagination::new(query.page_index, query.page_size);
        let (items, total) = self.store.search(query).await?;
        Ok(page.into_response(items, total))
    }

    /// Approve or reject a Waiting request. Rejection restores one copy per detail.
    ///
    /// A request that is no longer Waiting is refused whatever the target,
    /// including targets that name no status at all.
    pub async fn update_status(
        &self,
        request_id: i32,
        status: impl Into<StatusInput>,
        approver_id: i32,
    ) -> AppResult<()> {
        let status = status.into();
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or(BorrowingError::RequestNotFound)?;

        if request.status != RequestStatus::Waiting {
            return Err(BorrowingError::NotWaiting.into());
        }
        let status = status
            .status()
            .filter(RequestStatus::is_decision)
            .ok_or(BorrowingError::InvalidStatus)?;

        match self.store.update_status(request_id, status, approver_id).await? {
            StatusUpdateOutcome::Updated => {
                tracing::info!(
                    "Borrowing request {} set to {} by user {}",
                    request_id,
                    status,
                    approver_id
                );
                Ok(())
            }
            StatusUpdateOutcome::NotFound => Err(AppError::from(BorrowingError::RequestNotFound)),
            StatusUpdateOutcome::NotWaiting => Err(AppError::from(BorrowingError::NotWaiting)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{borrowing::BorrowingRequest, RoleName, User},
        repository::MockBorrowingStore,
        services::clock::FixedClock,
    };
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;

    fn user(id: i32, role: RoleName) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: format!("user{}@libris.local", id),
            password_hash: String::new(),
            role_id: if role == RoleName::SuperUser { 1 } else { 2 },
            role,
        }
    }

    fn service(store: MockBorrowingStore) -> BorrowingService {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        BorrowingService::new(Arc::new(store), Arc::new(FixedClock(now)))
    }

    fn waiting_request(id: i32) -> BorrowingRequest {
        BorrowingRequest {
            id,
            requestor_id: 2,
            approver_id: None,
            status: RequestStatus::Waiting,
            date_requested: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
            book_ids: vec![1, 4],
        }
    }

    #[tokio::test]
    async fn test_super_user_cannot_submit() {
        let mut store = MockBorrowingStore::new();
        store
            .expect_find_user()
            .with(eq(1))
            .returning(|id| Ok(Some(user(id, RoleName::SuperUser))));
        store.expect_create_request().never();

        let err = service(store).submit(1, vec![3]).await.unwrap_err();
        assert!(matches!(err, AppError::Borrowing(BorrowingError::RequestorNotAuthorized)));
    }

    #[tokio::test]
    async fn test_quota_checked_against_current_month() {
        let mut store = MockBorrowingStore::new();
        store
            .expect_find_user()
            .returning(|id| Ok(Some(user(id, RoleName::NormalUser))));
        store
            .expect_count_active_requests()
            .withf(|id, window| {
                *id == 2 && window.start == Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
            })
            .returning(|_, _| Ok(3));
        store.expect_available_book_ids().never();

        let err = service(store).submit(2, vec![3]).await.unwrap_err();
        assert!(matches!(err, AppError::Borrowing(BorrowingError::MonthlyLimitExceeded)));
    }

    #[tokio::test]
    async fn test_lost_race_reports_unavailable_books() {
        let mut store = MockBorrowingStore::new();
        store
            .expect_find_user()
            .returning(|id| Ok(Some(user(id, RoleName::NormalUser))));
        store.expect_count_active_requests().returning(|_, _| Ok(0));
        store
            .expect_available_book_ids()
            .returning(|ids| Ok(ids.to_vec()));
        store
            .expect_create_request()
            .times(1)
            .returning(|_| Ok(SubmitOutcome::Unavailable(vec![4])));

        let err = service(store).submit(2, vec![1, 4]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "The following book IDs are invalid or unavailable: 4"
        );
    }

    #[tokio::test]
    async fn test_database_failure_propagates() {
        let mut store = MockBorrowingStore::new();
        store
            .expect_find_user()
            .returning(|id| Ok(Some(user(id, RoleName::NormalUser))));
        store.expect_count_active_requests().returning(|_, _| Ok(1));
        store
            .expect_available_book_ids()
            .returning(|ids| Ok(ids.to_vec()));
        store
            .expect_create_request()
            .returning(|_| Err(AppError::Database(sqlx::Error::PoolTimedOut)));

        let err = service(store).submit(2, vec![1]).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_created_request_carries_clock_time_and_window() {
        let mut store = MockBorrowingStore::new();
        store
            .expect_find_user()
            .returning(|id| Ok(Some(user(id, RoleName::NormalUser))));
        store.expect_count_active_requests().returning(|_, _| Ok(2));
        store
            .expect_available_book_ids()
            .returning(|ids| Ok(ids.to_vec()));
        store
            .expect_create_request()
            .withf(|req| {
                req.requestor_id == 2
                    && req.book_ids == vec![5, 1]
                    && req.requested_at == Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap()
                    && req.window.end == Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()
                    && req.monthly_limit == MONTHLY_REQUEST_LIMIT
            })
            .returning(|_| Ok(SubmitOutcome::Created(42)));

        assert_eq!(service(store).submit(2, vec![5, 1]).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_waiting_status_is_not_a_valid_target() {
        let mut store = MockBorrowingStore::new();
        store
            .expect_get_request()
            .returning(|id| Ok(Some(waiting_request(id))));
        store.expect_update_status().never();

        let err = service(store)
            .update_status(8, RequestStatus::Waiting, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Borrowing(BorrowingError::InvalidStatus)));
    }

    #[tokio::test]
    async fn test_unrecognized_status_is_invalid_for_waiting_request() {
        let mut store = MockBorrowingStore::new();
        store
            .expect_get_request()
            .returning(|id| Ok(Some(waiting_request(id))));
        store.expect_update_status().never();

        let err = service(store)
            .update_status(8, StatusInput::Unknown("5".to_string()), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Borrowing(BorrowingError::InvalidStatus)));
    }

    #[tokio::test]
    async fn test_unknown_status_filter_is_rejected() {
        let mut store = MockBorrowingStore::new();
        store.expect_search().never();

        let query = BorrowingRequestQuery {
            search_status: Some(StatusInput::Unknown("Lost".to_string())),
            ..Default::default()
        };
        let err = service(store).list_all(&query).await.unwrap_err();
        assert!(matches!(err, AppError::Borrowing(BorrowingError::InvalidStatus)));
    }

    #[tokio::test]
    async fn test_unavailable_repeated_book_reports_availability() {
        let mut store = MockBorrowingStore::new();
        store
            .expect_find_user()
            .returning(|id| Ok(Some(user(id, RoleName::NormalUser))));
        store.expect_count_active_requests().returning(|_, _| Ok(0));
        store.expect_available_book_ids().returning(|_| Ok(vec![]));
        store.expect_create_request().never();

        let err = service(store).submit(2, vec![7, 7]).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Borrowing(BorrowingError::UnavailableBooks(ref ids)) if ids == &vec![7]
        ));
    }

    #[tokio::test]
    async fn test_concurrent_decision_reports_not_waiting() {
        let mut store = MockBorrowingStore::new();
        store
            .expect_get_request()
            .returning(|id| Ok(Some(waiting_request(id))));
        store
            .expect_update_status()
            .with(eq(8), eq(RequestStatus::Approved), eq(1))
            .returning(|_, _, _| Ok(StatusUpdateOutcome::NotWaiting));

        let err = service(store)
            .update_status(8, RequestStatus::Approved, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Borrowing(BorrowingError::NotWaiting)));
    }

    #[tokio::test]
    async fn test_monthly_count_reports_limit() {
        let mut store = MockBorrowingStore::new();
        store
            .expect_find_user()
            .returning(|id| Ok(Some(user(id, RoleName::NormalUser))));
        store.expect_count_active_requests().returning(|_, _| Ok(2));

        let count = service(store).monthly_count(2).await.unwrap();
        assert_eq!(count, MonthlyRequestCount { count: 2, limit: 3 });
    }
}
