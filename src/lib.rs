//! Libris Library Management Server
//!
//! REST JSON API for a book catalog and the borrowing request workflow:
//! normal users request up to five books at a time, three times a month,
//! and super users approve or reject those requests.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
