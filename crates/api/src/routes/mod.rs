//! HTTP handlers, one module per resource.

pub mod auth;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod regions;
pub mod reviews;
pub mod users;
pub mod wines;

use common::Page;
use serde::Serialize;

use crate::error::ApiError;

/// A page of results as rendered on the wire.
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        let total_pages = page.total_pages();
        Self {
            content: page.content,
            page: page.page,
            size: page.size,
            total_elements: page.total_elements,
            total_pages,
        }
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Quantities arrive signed so that zero and negatives get the same message.
pub(crate) fn require_quantity(quantity: i64) -> Result<u32, ApiError> {
    if quantity < 1 {
        return Err(ApiError::bad_request("quantity must be at least 1"));
    }
    u32::try_from(quantity).map_err(|_| ApiError::bad_request("quantity is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PageRequest;

    #[test]
    fn quantity_bounds() {
        assert!(require_quantity(0).is_err());
        assert!(require_quantity(-3).is_err());
        assert!(require_quantity(i64::MAX).is_err());
        assert_eq!(require_quantity(6).unwrap(), 6);
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(require_text("name", "  ").is_err());
        assert!(require_text("name", "Margaux").is_ok());
    }

    #[test]
    fn page_response_carries_total_pages() {
        let page = Page::from_vec((0..5).collect::<Vec<_>>(), &PageRequest::new(0, 2));
        let response = PageResponse::from(page);
        assert_eq!(response.content, vec![0, 1]);
        assert_eq!(response.total_elements, 5);
        assert_eq!(response.total_pages, 3);
    }
}
