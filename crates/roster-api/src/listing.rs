use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::debug;

use roster_paging::{FIRST_PAGE_TOKEN, PageSize};
use roster_types::api::EmployeePage;

use crate::auth::{AppState, AppStateInner};
use crate::employees::employee_response;
use crate::error::ApiError;

/// Both fields stay raw text so a bad page size surfaces as our own
/// `InvalidPageSize` rather than an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "pageSize", alias = "page_size")]
    pub page_size: Option<String>,
    /// Absent means the first page. An empty value is an invalid cursor,
    /// not a request to start over.
    pub cursor: Option<String>,
}

/// GET /employees?pageSize=<n>&cursor=<token>
pub async fn list_employees(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<EmployeePage>, ApiError> {
    let cursor = query.cursor.as_deref().unwrap_or(FIRST_PAGE_TOKEN);

    fetch_page(&state, query.page_size.as_deref(), cursor).await
}

/// GET /employees/page/{page_size}/{cursor}
pub async fn list_employees_page(
    State(state): State<AppState>,
    Path((page_size, cursor)): Path<(String, String)>,
) -> Result<Json<EmployeePage>, ApiError> {
    fetch_page(&state, Some(&page_size), &cursor).await
}

async fn fetch_page(
    state: &AppStateInner,
    page_size: Option<&str>,
    cursor: &str,
) -> Result<Json<EmployeePage>, ApiError> {
    // Validate before touching the store.
    let page_size = PageSize::parse(page_size)?;

    let page = state
        .planner
        .page(cursor, page_size)
        .await
        .inspect_err(|e| debug!("Listing stopped: {}", e))?;

    let employees = page
        .items
        .iter()
        .map(employee_response)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let next_cursor = page.next_cursor().map(str::to_string);

    debug!(
        "Listing page of {} employees (more: {})",
        employees.len(),
        next_cursor.is_some()
    );
    Ok(Json(EmployeePage {
        total_items: employees.len(),
        employees,
        next_cursor,
        resume_cursor: page.resume_cursor,
    }))
}
