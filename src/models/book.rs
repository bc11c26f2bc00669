//! Book model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

/// Book row with its category name resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publication_date: NaiveDate,
    /// Total copies owned
    pub quantity: i32,
    /// Copies not currently reserved by a borrowing request
    pub available: i32,
    pub category_id: i32,
    pub category: Option<String>,
}

/// Book list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    pub category_id: Option<i32>,
    /// Case-insensitive substring of title, author or ISBN
    pub search_string: Option<String>,
    /// true: only books with copies left, false: only exhausted books
    pub is_available: Option<bool>,
    pub page_index: Option<i64>,
    pub page_size: Option<i64>,
}

/// Create book request. `available` starts equal to `quantity`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Author must be 1 to 100 characters"))]
    pub author: String,
    #[validate(length(min = 1, max = 120, message = "ISBN must be 1 to 120 characters"))]
    pub isbn: String,
    pub publication_date: NaiveDate,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
    pub category_id: i32,
}

/// Full replacement of a book's fields
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_copy_counts"))]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Author must be 1 to 100 characters"))]
    pub author: String,
    #[validate(length(min = 1, max = 120, message = "ISBN must be 1 to 120 characters"))]
    pub isbn: String,
    pub publication_date: NaiveDate,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
    #[validate(range(min = 0, message = "Available cannot be negative"))]
    pub available: i32,
    pub category_id: i32,
}

impl UpdateBook {
    /// Copies held by waiting requests must stay out of `available`
    pub fn leaves_room_for(&self, reserved: i64) -> bool {
        i64::from(self.quantity) - i64::from(self.available) >= reserved
    }
}

fn validate_copy_counts(book: &UpdateBook) -> Result<(), ValidationError> {
    if book.available > book.quantity {
        let mut err = ValidationError::new("available_exceeds_quantity");
        err.message = Some("Available copies cannot exceed quantity".into());
        return Err(err);
    }
    Ok(())
}
