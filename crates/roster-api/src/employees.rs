use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use roster_db::models::{EmployeeChanges, EmployeeRow, NewEmployee};
use roster_types::api::{
    CreateEmployeeRequest, EmployeeResponse, ResetPasswordRequest, UpdateEmployeeRequest,
};

use crate::auth::{AppState, AppStateInner, AuthUser, hash_password};
use crate::blocking;
use crate::error::ApiError;

const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;

pub async fn create_employee(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateEmployeeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate_email(&req.email)?;
    guard_admin_email(&state, &user, &email)?;
    validate_password(&req.password)?;

    let id = Uuid::new_v4();
    let row = blocking(move || -> anyhow::Result<EmployeeRow> {
        let password = hash_password(&state.hasher, &req.password)?;
        state.db.insert_employee(NewEmployee {
            id: id.to_string(),
            email,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            password,
            active: req.active,
        })
    })
    .await?
    .map_err(ApiError::conflict_on_unique("provided email already exists"))?;

    info!("Created employee {} (by {})", id, user.id);
    Ok((StatusCode::CREATED, Json(employee_response(&row)?)))
}

pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EmployeeResponse>, ApiError> {
    let row = blocking(move || state.db.get_employee(&id.to_string()))
        .await??
        .ok_or(ApiError::NotFound("employee not found"))?;

    Ok(Json(employee_response(&row)?))
}

/// Replace profile fields. The password and creation time are untouched.
pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateEmployeeRequest>,
) -> Result<Json<EmployeeResponse>, ApiError> {
    if !user.can_manage(id) {
        return Err(ApiError::Forbidden("only the admin may update other employees"));
    }
    let email = validate_email(&req.email)?;
    guard_admin_email(&state, &user, &email)?;
    let changes = EmployeeChanges {
        email,
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        active: req.active,
    };

    let row = blocking(move || -> anyhow::Result<Option<EmployeeRow>> {
        let id = id.to_string();
        if !state.db.update_employee(&id, &changes, Utc::now())? {
            return Ok(None);
        }
        state.db.get_employee(&id)
    })
    .await?
    .map_err(ApiError::conflict_on_unique("provided email already exists"))?
    .ok_or(ApiError::NotFound("employee not found"))?;

    info!("Updated employee {} (by {})", id, user.id);
    Ok(Json(employee_response(&row)?))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if !user.can_manage(id) {
        return Err(ApiError::Forbidden("only the admin may reset other passwords"));
    }
    validate_password(&req.password)?;

    let updated = blocking(move || -> anyhow::Result<bool> {
        let hash = hash_password(&state.hasher, &req.password)?;
        state.db.set_password(&id.to_string(), &hash, Utc::now())
    })
    .await??;

    if !updated {
        return Err(ApiError::NotFound("employee not found"));
    }
    info!("Password reset for employee {} (by {})", id, user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// The admin may delete anyone; everyone else only themselves.
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, ApiError> {
    if !user.can_manage(id) {
        return Err(ApiError::Forbidden("only the admin may delete other employees"));
    }

    let deleted = blocking(move || state.db.delete_employee(&id.to_string())).await??;
    if !deleted {
        return Err(ApiError::NotFound("employee not found"));
    }

    info!("Deleted employee {} (by {})", id, user.id);
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn employee_response(row: &EmployeeRow) -> anyhow::Result<EmployeeResponse> {
    let id: Uuid = row
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("Corrupt employee id '{}': {}", row.id, e))?;

    Ok(EmployeeResponse {
        id,
        email: row.email.clone(),
        first_name: row.first_name.clone(),
        last_name: row.last_name.clone(),
        active: row.active,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Admin rights follow the admin email, so only the admin may assign it.
fn guard_admin_email(state: &AppStateInner, user: &AuthUser, email: &str) -> Result<(), ApiError> {
    if state.is_admin(email) && !user.is_admin {
        return Err(ApiError::Forbidden("only the admin may use the admin email"));
    }
    Ok(())
}

/// Returns the trimmed email.
fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim();
    let well_formed = matches!(
        email.split_once('@'),
        Some((local, domain)) if !local.is_empty() && !domain.is_empty()
    );
    if !well_formed || email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::BadRequest("email address is invalid".into()));
    }
    Ok(email.to_string())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
