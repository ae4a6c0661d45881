pub mod auth;
pub mod employees;
pub mod error;
pub mod listing;
pub mod middleware;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, put},
};
use tracing::error;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_basic_auth;

/// All routes. `/ping` is public, everything else needs basic auth.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/employees",
            get(listing::list_employees).post(employees::create_employee),
        )
        .route(
            "/employees/page/{page_size}/{cursor}",
            get(listing::list_employees_page),
        )
        .route(
            "/employees/{id}",
            get(employees::get_employee)
                .put(employees::update_employee)
                .delete(employees::delete_employee),
        )
        .route("/employees/{id}/password", put(employees::reset_password))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ))
        .with_state(state);

    Router::new().route("/ping", get(ping)).merge(protected)
}

async fn ping() -> &'static str {
    "pong"
}

/// Run blocking DB or hashing work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })
}
