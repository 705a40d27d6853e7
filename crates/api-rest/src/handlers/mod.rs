//! Request handlers, one module per resource.

pub mod appointments;
pub mod availability;
pub mod consultations;
pub mod health;
pub mod inbox;
pub mod payments;
pub mod providers;
pub mod reviews;
pub mod visits;

use carebook_core::Page;

use crate::error::ApiError;
use crate::state::AppState;

pub(crate) fn page(
    state: &AppState,
    page: Option<usize>,
    page_size: Option<usize>,
) -> Result<Page, ApiError> {
    Ok(state.services.page(page, page_size)?)
}

pub(crate) fn collect<T, R: From<T>>(rows: Vec<T>) -> Vec<R> {
    rows.into_iter().map(R::from).collect()
}
