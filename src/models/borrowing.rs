//! Borrowing request model, status lifecycle and workflow failures

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

use super::book::Book;

/// Non-rejected requests a normal user may place per calendar month
pub const MONTHLY_REQUEST_LIMIT: i64 = 3;
/// Minimum and maximum number of books in one request
pub const MIN_BOOKS_PER_REQUEST: usize = 1;
pub const MAX_BOOKS_PER_REQUEST: usize = 5;

/// Request status. Numeric values are the ones persisted in `borrowing_requests.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum RequestStatus {
    Approved = 0,
    Rejected = 1,
    Waiting = 2,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Waiting => "Waiting",
        }
    }

    /// Approved and Rejected are final
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Waiting)
    }

    /// Targets accepted by a status update
    pub fn is_decision(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        *self == RequestStatus::Waiting && next.is_decision()
    }
}

impl TryFrom<i16> for RequestStatus {
    type Error = String;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(RequestStatus::Approved),
            1 => Ok(RequestStatus::Rejected),
            2 => Ok(RequestStatus::Waiting),
            _ => Err(format!("Invalid request status: {}", v)),
        }
    }
}

impl From<RequestStatus> for i16 {
    fn from(s: RequestStatus) -> Self {
        s as i16
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    /// Status name in any case, or its numeric code
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i16>() {
            return RequestStatus::try_from(code);
        }
        match s.to_ascii_lowercase().as_str() {
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "waiting" => Ok(RequestStatus::Waiting),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

/// Status as sent by a client, either by name or by numeric code.
///
/// Values that name no status are kept as `Unknown` instead of failing
/// deserialization, so the workflow decides how to reject them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusInput {
    Known(RequestStatus),
    Unknown(String),
}

impl StatusInput {
    pub fn status(&self) -> Option<RequestStatus> {
        match self {
            StatusInput::Known(status) => Some(*status),
            StatusInput::Unknown(_) => None,
        }
    }
}

impl Default for StatusInput {
    fn default() -> Self {
        StatusInput::Unknown(String::new())
    }
}

impl From<RequestStatus> for StatusInput {
    fn from(status: RequestStatus) -> Self {
        StatusInput::Known(status)
    }
}

impl<'de> Deserialize<'de> for StatusInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(i64),
            Name(String),
            Other(serde_json::Value),
        }

        let input = match Raw::deserialize(deserializer)? {
            Raw::Code(code) => i16::try_from(code)
                .ok()
                .and_then(|c| RequestStatus::try_from(c).ok())
                .map(StatusInput::Known)
                .unwrap_or_else(|| StatusInput::Unknown(code.to_string())),
            Raw::Name(name) => match name.parse() {
                Ok(status) => StatusInput::Known(status),
                Err(_) => StatusInput::Unknown(name),
            },
            Raw::Other(value) => StatusInput::Unknown(value.to_string()),
        };
        Ok(input)
    }
}

/// Expected workflow failures. Display strings are stable and shown to users as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BorrowingError {
    #[error("Requestor not found or not authorized")]
    RequestorNotAuthorized,

    #[error("Monthly request limit exceeded: at most {} requests per month", MONTHLY_REQUEST_LIMIT)]
    MonthlyLimitExceeded,

    #[error(
        "You must request between {} and {} books",
        MIN_BOOKS_PER_REQUEST,
        MAX_BOOKS_PER_REQUEST
    )]
    InvalidBookCount,

    #[error("The following book IDs are requested more than once: {}", join_ids(.0))]
    DuplicateBooks(Vec<i32>),

    #[error("The following book IDs are invalid or unavailable: {}", join_ids(.0))]
    UnavailableBooks(Vec<i32>),

    #[error("Book borrowing request not found")]
    RequestNotFound,

    #[error("Request is not in Waiting status")]
    NotWaiting,

    #[error("Invalid status provided")]
    InvalidStatus,
}

fn join_ids(ids: &[i32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Persisted borrowing request with its detail book ids
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowingRequest {
    pub id: i32,
    pub requestor_id: i32,
    pub approver_id: Option<i32>,
    pub status: RequestStatus,
    pub date_requested: DateTime<Utc>,
    pub book_ids: Vec<i32>,
}

/// Raw `borrowing_requests` row
#[derive(Debug, Clone, FromRow)]
pub struct BorrowingRequestRow {
    pub id: i32,
    pub requestor_id: i32,
    pub approver_id: Option<i32>,
    pub status: i16,
    pub date_requested: DateTime<Utc>,
}

impl BorrowingRequestRow {
    pub fn into_request(self, book_ids: Vec<i32>) -> Result<BorrowingRequest, String> {
        Ok(BorrowingRequest {
            id: self.id,
            requestor_id: self.requestor_id,
            approver_id: self.approver_id,
            status: RequestStatus::try_from(self.status)?,
            date_requested: self.date_requested,
            book_ids,
        })
    }
}

/// Everything the store needs to create a request atomically
#[derive(Debug, Clone, PartialEq)]
pub struct NewBorrowingRequest {
    pub requestor_id: i32,
    pub book_ids: Vec<i32>,
    pub requested_at: DateTime<Utc>,
    /// Quota window, re-checked inside the write transaction
    pub window: MonthWindow,
    pub monthly_limit: i64,
}

/// Row of the filtered request list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowingRequestSummary {
    pub id: i32,
    pub requestor: String,
    pub approver: Option<String>,
    pub status: RequestStatus,
    pub date_requested: NaiveDate,
}

/// A requestor's request with every requested book expanded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowingRequestView {
    pub id: i32,
    pub requestor: String,
    pub approver: Option<String>,
    pub status: RequestStatus,
    pub date_requested: NaiveDate,
    pub book_requested: Vec<Book>,
}

/// Filters for the request list
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowingRequestQuery {
    /// Substring of the requestor's username
    pub search_requestor: Option<String>,
    /// Exact status, by name or numeric code
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>)]
    pub search_status: Option<StatusInput>,
    pub page_index: Option<i64>,
    pub page_size: Option<i64>,
}

/// Query of the monthly quota endpoint
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct MonthRequestQuery {
    pub requestor_id: i32,
}

/// Book line of a submission
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetailInput {
    pub book_id: i32,
}

/// Submission body. The requestor is the authenticated caller.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBorrowingRequest {
    #[serde(default)]
    pub request_details: Vec<RequestDetailInput>,
}

impl SubmitBorrowingRequest {
    pub fn book_ids(&self) -> Vec<i32> {
        self.request_details.iter().map(|d| d.book_id).collect()
    }
}

/// Status update body. The approver is the authenticated caller.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// `Approved`/`Rejected` or the codes `0`/`1`
    #[serde(default)]
    #[schema(value_type = String, example = "Approved")]
    pub status: StatusInput,
}

/// Id of a newly submitted request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmittedRequest {
    pub id: i32,
}

/// Non-rejected requests this month against the monthly limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MonthlyRequestCount {
    pub count: i64,
    pub limit: i64,
}

/// Result of the transactional create
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(i32),
    QuotaExceeded,
    Unavailable(Vec<i32>),
}

/// Result of the transactional status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdateOutcome {
    Updated,
    NotFound,
    NotWaiting,
}

/// Half-open UTC interval `[start, end)` covering one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthWindow {
    /// Calendar month (UTC) containing `now`
    pub fn containing(now: DateTime<Utc>) -> Self {
        let (year, month) = (now.year(), now.month());
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        Self {
            start: first_instant(year, month),
            end: first_instant(next_year, next_month),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

fn first_instant(year: i32, month: u32) -> DateTime<Utc> {
    // Day 1 at midnight always exists in UTC
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Requested ids that occur more than once, in order of their second occurrence
pub fn duplicate_ids(requested: &[i32]) -> Vec<i32> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    requested
        .iter()
        .copied()
        .filter(|id| !seen.insert(*id) && reported.insert(*id))
        .collect()
}

/// Requested ids missing from `available`, in input order without repeats
pub fn unavailable_ids(requested: &[i32], available: &[i32]) -> Vec<i32> {
    let available: HashSet<i32> = available.iter().copied().collect();
    let mut reported = HashSet::new();
    requested
        .iter()
        .copied()
        .filter(|id| !available.contains(id) && reported.insert(*id))
        .collect()
}
