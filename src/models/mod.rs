//! Data models for Libris

pub mod book;
pub mod borrowing;
pub mod category;
pub mod pagination;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use borrowing::{BorrowingError, BorrowingRequest, RequestStatus};
pub use category::Category;
pub use pagination::{PaginatedResponse, Pagination};
pub use user::{RoleName, User, UserView};
