//! Business logic services

pub mod auth;
pub mod books;
pub mod borrowing;
pub mod categories;
pub mod clock;

use std::sync::Arc;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub books: books::BooksService,
    pub categories: categories::CategoriesService,
    pub borrowing: borrowing::BorrowingService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        let store = Arc::new(repository.borrowing.clone());
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config),
            books: books::BooksService::new(repository.clone()),
            categories: categories::CategoriesService::new(repository.clone()),
            borrowing: borrowing::BorrowingService::new(store, Arc::new(clock::SystemClock)),
            repository,
        }
    }
}
