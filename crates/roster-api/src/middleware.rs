use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::debug;
use uuid::Uuid;

use crate::auth::{AppState, AppStateInner, AuthUser, verify_password};
use crate::blocking;
use crate::error::ApiError;

/// Check HTTP basic credentials against the employee table.
///
/// On success the [`AuthUser`] is available to handlers as an extension.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (email, password) = basic_credentials(req.headers()).ok_or(ApiError::Unauthorized)?;

    let user = blocking(move || authenticate(&state, &email, &password)).await??;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Decode `Authorization: Basic base64(email:password)`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let encoded = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Basic ")?;
    let decoded = String::from_utf8(B64.decode(encoded.trim()).ok()?).ok()?;
    let (email, password) = decoded.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}

pub(crate) fn authenticate(state: &AppStateInner, email: &str, password: &str) -> Result<AuthUser, ApiError> {
    let Some(employee) = state.db.get_employee_by_email(email)? else {
        verify_password(&state.hasher, state.dummy_hash(), password);
        debug!("Rejected credentials for unknown email");
        return Err(ApiError::Unauthorized);
    };

    if !verify_password(&state.hasher, &employee.password, password) {
        debug!("Rejected credentials for employee {}", employee.id);
        return Err(ApiError::Unauthorized);
    }
    if !employee.active {
        return Err(ApiError::Forbidden("account is inactive"));
    }

    let id: Uuid = employee
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("Corrupt employee id '{}': {}", employee.id, e))?;

    Ok(AuthUser {
        id,
        is_admin: state.is_admin(&employee.email),
        email: employee.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_basic_credentials() {
        let value = format!("Basic {}", B64.encode("ada@example.com:pa:ss"));
        assert_eq!(
            basic_credentials(&headers(&value)),
            Some(("ada@example.com".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert_eq!(basic_credentials(&HeaderMap::new()), None);
        assert_eq!(basic_credentials(&headers("Bearer abc.def.ghi")), None);
        assert_eq!(basic_credentials(&headers("Basic %%%")), None);
        let no_colon = format!("Basic {}", B64.encode("ada@example.com"));
        assert_eq!(basic_credentials(&headers(&no_colon)), None);
    }
}
