//! Borrowing request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        borrowing::{
            BorrowingRequestQuery, BorrowingRequestSummary, BorrowingRequestView,
            MonthRequestQuery, MonthlyRequestCount, SubmitBorrowingRequest, SubmittedRequest,
            UpdateStatusRequest,
        },
        pagination::PaginatedResponse,
    },
};

use super::AuthenticatedUser;

/// List borrowing requests with filters and pagination
#[utoipa::path(
    get,
    path = "/borrowing-requests",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    params(BorrowingRequestQuery),
    responses(
        (status = 200, description = "Page of requests", body = PaginatedResponse<BorrowingRequestSummary>),
        (status = 400, description = "Unknown status filter", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_requests(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<BorrowingRequestQuery>,
) -> AppResult<Json<PaginatedResponse<BorrowingRequestSummary>>> {
    let page = state.services.borrowing.list_all(&query).await?;
    Ok(Json(page))
}

/// Submit a borrowing request for the authenticated user
#[utoipa::path(
    post,
    path = "/borrowing-requests",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    request_body = SubmitBorrowingRequest,
    responses(
        (status = 200, description = "Request created in Waiting status", body = SubmittedRequest),
        (status = 400, description = "Quota, book count or availability rule violated", body = crate::error::ErrorResponse),
        (status = 403, description = "Only normal users may borrow books")
    )
)]
pub async fn submit_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<SubmitBorrowingRequest>,
) -> AppResult<Json<SubmittedRequest>> {
    claims.require_normal_user()?;

    let id = state
        .services
        .borrowing
        .submit(claims.user_id, request.book_ids())
        .await?;
    Ok(Json(SubmittedRequest { id }))
}

/// Requests placed this month by a requestor
#[utoipa::path(
    get,
    path = "/borrowing-requests/requestor/{id}",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Requestor user ID")
    ),
    responses(
        (status = 200, description = "Requests with their books", body = Vec<BorrowingRequestView>),
        (status = 400, description = "Requestor not found or not authorized", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_by_requestor(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(requestor_id): Path<i32>,
) -> AppResult<Json<Vec<BorrowingRequestView>>> {
    claims.require_self_or_super_user(requestor_id)?;

    let requests = state.services.borrowing.list_by_requestor(requestor_id).await?;
    Ok(Json(requests))
}

/// Non-rejected requests of a requestor this month
#[utoipa::path(
    get,
    path = "/borrowing-requests/month-request",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    params(MonthRequestQuery),
    responses(
        (status = 200, description = "Monthly request count", body = MonthlyRequestCount),
        (status = 400, description = "Requestor not found or not authorized", body = crate::error::ErrorResponse)
    )
)]
pub async fn month_request_count(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<MonthRequestQuery>,
) -> AppResult<Json<MonthlyRequestCount>> {
    claims.require_self_or_super_user(query.requestor_id)?;

    let count = state.services.borrowing.monthly_count(query.requestor_id).await?;
    Ok(Json(count))
}

/// Approve or reject a waiting request
#[utoipa::path(
    put,
    path = "/borrowing-requests/{id}/update-status",
    tag = "borrowing",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing request ID")
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 204, description = "Status updated"),
        (status = 400, description = "Request missing, not waiting, or invalid target status", body = crate::error::ErrorResponse),
        (status = 403, description = "Super user required")
    )
)]
pub async fn update_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateStatusRequest>,
) -> AppResult<StatusCode> {
    claims.require_super_user()?;

    state
        .services
        .borrowing
        .update_status(id, request.status, claims.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
