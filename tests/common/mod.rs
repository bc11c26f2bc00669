//! In-memory borrowing store used by the workflow tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use libris_server::{
    error::AppResult,
    models::{
        book::Book,
        borrowing::{
            unavailable_ids, BorrowingRequest, BorrowingRequestQuery, BorrowingRequestSummary,
            BorrowingRequestView, MonthWindow, NewBorrowingRequest, RequestStatus, StatusInput,
            StatusUpdateOutcome, SubmitOutcome,
        },
        pagination::Pagination,
        RoleName, User,
    },
    repository::BorrowingStore,
    services::{borrowing::BorrowingService, clock::FixedClock},
};

#[derive(Default)]
struct State {
    users: BTreeMap<i32, User>,
    books: BTreeMap<i32, Book>,
    requests: BTreeMap<i32, BorrowingRequest>,
    next_request_id: i32,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, id: i32, role: RoleName) {
        let user = User {
            id,
            username: format!("user{}", id),
            email: format!("user{}@libris.local", id),
            password_hash: String::new(),
            role_id: if role == RoleName::SuperUser { 1 } else { 2 },
            role,
        };
        self.state.lock().unwrap().users.insert(id, user);
    }

    pub fn add_book(&self, id: i32, quantity: i32, available: i32) {
        let book = Book {
            id,
            title: format!("Book {}", id),
            author: "Author".to_string(),
            isbn: format!("978-{:010}", id),
            publication_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            quantity,
            available,
            category_id: 1,
            category: Some("Fiction".to_string()),
        };
        self.state.lock().unwrap().books.insert(id, book);
    }

    /// Insert an existing request without touching availability
    pub fn add_request(
        &self,
        requestor_id: i32,
        status: RequestStatus,
        date_requested: DateTime<Utc>,
        book_ids: Vec<i32>,
    ) -> i32 {
        let mut state = self.state.lock().unwrap();
        state.next_request_id += 1;
        let id = state.next_request_id;
        state.requests.insert(
            id,
            BorrowingRequest {
                id,
                requestor_id,
                approver_id: None,
                status,
                date_requested,
                book_ids,
            },
        );
        id
    }

    pub fn book(&self, id: i32) -> Book {
        self.state.lock().unwrap().books[&id].clone()
    }

    pub fn request(&self, id: i32) -> BorrowingRequest {
        self.state.lock().unwrap().requests[&id].clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Every book satisfies 0 <= available <= quantity
    pub fn availability_in_range(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .books
            .values()
            .all(|b| b.available >= 0 && b.available <= b.quantity)
    }
}

fn count_active(state: &State, requestor_id: i32, window: MonthWindow) -> i64 {
    state
        .requests
        .values()
        .filter(|r| {
            r.requestor_id == requestor_id
                && r.status != RequestStatus::Rejected
                && window.contains(r.date_requested)
        })
        .count() as i64
}

/// Rows of `items` on the given page
fn page_slice<T: Clone>(items: &[T], page: Pagination) -> Vec<T> {
    items
        .iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(page.limit()).unwrap_or(0))
        .cloned()
        .collect()
}

fn username(state: &State, id: Option<i32>) -> Option<String> {
    id.and_then(|id| state.users.get(&id)).map(|u| u.username.clone())
}

#[async_trait]
impl BorrowingStore for InMemoryStore {
    async fn find_user(&self, user_id: i32) -> AppResult<Option<User>> {
        Ok(self.state.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn count_active_requests(&self, requestor_id: i32, window: MonthWindow) -> AppResult<i64> {
        Ok(count_active(&self.state.lock().unwrap(), requestor_id, window))
    }

    async fn available_book_ids(&self, book_ids: &[i32]) -> AppResult<Vec<i32>> {
        let state = self.state.lock().unwrap();
        Ok(book_ids
            .iter()
            .copied()
            .filter(|id| state.books.get(id).map_or(false, |b| b.available > 0))
            .collect())
    }

    async fn create_request(&self, request: &NewBorrowingRequest) -> AppResult<SubmitOutcome> {
        let mut state = self.state.lock().unwrap();

        if count_active(&state, request.requestor_id, request.window) >= request.monthly_limit {
            return Ok(SubmitOutcome::QuotaExceeded);
        }

        let available: Vec<i32> = request
            .book_ids
            .iter()
            .copied()
            .filter(|id| state.books.get(id).map_or(false, |b| b.available > 0))
            .collect();
        let missing = unavailable_ids(&request.book_ids, &available);
        if !missing.is_empty() {
            return Ok(SubmitOutcome::Unavailable(missing));
        }

        for id in &request.book_ids {
            if let Some(book) = state.books.get_mut(id) {
                book.available -= 1;
            }
        }

        state.next_request_id += 1;
        let id = state.next_request_id;
        state.requests.insert(
            id,
            BorrowingRequest {
                id,
                requestor_id: request.requestor_id,
                approver_id: None,
                status: RequestStatus::Waiting,
                date_requested: request.requested_at,
                book_ids: request.book_ids.clone(),
            },
        );
        Ok(SubmitOutcome::Created(id))
    }

    async fn get_request(&self, id: i32) -> AppResult<Option<BorrowingRequest>> {
        Ok(self.state.lock().unwrap().requests.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: i32,
        status: RequestStatus,
        approver_id: i32,
    ) -> AppResult<StatusUpdateOutcome> {
        let mut state = self.state.lock().unwrap();

        let Some(request) = state.requests.get_mut(&id) else {
            return Ok(StatusUpdateOutcome::NotFound);
        };
        if !request.status.can_transition_to(status) {
            return Ok(StatusUpdateOutcome::NotWaiting);
        }
        request.status = status;
        request.approver_id = Some(approver_id);
        let book_ids = request.book_ids.clone();

        if status == RequestStatus::Rejected {
            for book_id in book_ids {
                if let Some(book) = state.books.get_mut(&book_id) {
                    book.available += 1;
                }
            }
        }
        Ok(StatusUpdateOutcome::Updated)
    }

    async fn list_by_requestor(
        &self,
        requestor_id: i32,
        window: MonthWindow,
    ) -> AppResult<Vec<BorrowingRequestView>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .requests
            .values()
            .filter(|r| r.requestor_id == requestor_id && window.contains(r.date_requested))
            .map(|r| BorrowingRequestView {
                id: r.id,
                requestor: username(&state, Some(r.requestor_id)).unwrap_or_default(),
                approver: username(&state, r.approver_id),
                status: r.status,
                date_requested: r.date_requested.date_naive(),
                book_requested: r
                    .book_ids
                    .iter()
                    .filter_map(|id| state.books.get(id).cloned())
                    .collect(),
            })
            .collect())
    }

    async fn search(
        &self,
        query: &BorrowingRequestQuery,
    ) -> AppResult<(Vec<BorrowingRequestSummary>, i64)> {
        let state = self.state.lock().unwrap();
        let needle = query.search_requestor.as_deref().map(str::to_lowercase);

        let matching: Vec<BorrowingRequestSummary> = state
            .requests
            .values()
            .map(|r| BorrowingRequestSummary {
                id: r.id,
                requestor: username(&state, Some(r.requestor_id)).unwrap_or_default(),
                approver: username(&state, r.approver_id),
                status: r.status,
                date_requested: r.date_requested.date_naive(),
            })
            .filter(|s| {
                needle
                    .as_deref()
                    .map_or(true, |n| s.requestor.to_lowercase().contains(n))
                    && query
                        .search_status
                        .as_ref()
                        .and_then(StatusInput::status)
                        .map_or(true, |st| s.status == st)
            })
            .collect();

        let page = Pagination::new(query.page_index, query.page_size);
        Ok((page_slice(&matching, page), matching.len() as i64))
    }
}

/// Workflow service over `store` with the clock frozen at `now`
pub fn service(store: &Arc<InMemoryStore>, now: DateTime<Utc>) -> BorrowingService {
    BorrowingService::new(store.clone(), Arc::new(FixedClock(now)))
}
