//! Category service

use crate::{
    error::{AppError, AppResult},
    models::{
        category::{Category, CategoryQuery},
        pagination::{PaginatedResponse, Pagination},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CategoriesService {
    repository: Repository,
}

impl CategoriesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_all(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.list_all().await
    }

    pub async fn search(&self, query: &CategoryQuery) -> AppResult<PaginatedResponse<Category>> {
        let page = Pagination::new(query.page_index, query.page_size);
        let (categories, total) = self
            .repository
            .categories
            .search(query.name.as_deref(), page)
            .await?;
        Ok(page.into_response(categories, total))
    }

    pub async fn create(&self, name: &str) -> AppResult<Category> {
        let category = self.repository.categories.create(name.trim()).await?;
        tracing::info!("Category {} created", category.id);
        Ok(category)
    }

    pub async fn update(&self, id: i32, name: &str) -> AppResult<Category> {
        self.repository.categories.rename(id, name.trim()).await
    }

    /// Delete an empty category
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        if self.repository.categories.find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        if self.repository.books.category_has_books(id).await? {
            return Err(AppError::BusinessRule(
                "Cannot delete category because it contains books!".to_string(),
            ));
        }
        self.repository.categories.delete(id).await
    }
}
