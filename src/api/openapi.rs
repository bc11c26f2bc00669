//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, borrowing, categories, health, users};
use crate::models::{book, borrowing as borrowing_models, category, user};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library book catalog and borrowing request REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::sign_in,
        auth::sign_up,
        auth::me,
        // Users
        users::get_user,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Categories
        categories::list_categories,
        categories::filter_categories,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Borrowing requests
        borrowing::list_requests,
        borrowing::submit_request,
        borrowing::list_by_requestor,
        borrowing::month_request_count,
        borrowing::update_status,
    ),
    components(
        schemas(
            // Users
            user::RoleName,
            user::UserView,
            user::SignInRequest,
            user::SignUpRequest,
            user::TokenResponse,
            // Catalog
            book::Book,
            book::CreateBook,
            book::UpdateBook,
            category::Category,
            category::CategoryRequest,
            // Borrowing
            borrowing_models::RequestStatus,
            borrowing_models::BorrowingRequestSummary,
            borrowing_models::BorrowingRequestView,
            borrowing_models::RequestDetailInput,
            borrowing_models::SubmitBorrowingRequest,
            borrowing_models::SubmittedRequest,
            borrowing_models::MonthlyRequestCount,
            borrowing_models::UpdateStatusRequest,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User lookup"),
        (name = "books", description = "Book catalog management"),
        (name = "categories", description = "Book categories"),
        (name = "borrowing", description = "Borrowing requests and approval")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by secured paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
