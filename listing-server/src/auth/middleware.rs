//! Authentication middleware
//!
//! Applied with `route_layer` on the protected routers only; public routes
//! (listing reads, image delivery, health) never pass through here.

use std::future::Future;
use std::pin::Pin;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppError;
use crate::auth::{CurrentUser, JwtError, JwtService, Role};
use crate::core::ServerState;
use crate::security_log;

/// Require an authenticated caller
///
/// Validates `Authorization: Bearer <token>` and inserts [`CurrentUser`]
/// into the request extensions.
///
/// | Failure | Response |
/// |---------|----------|
/// | No Authorization header | 401 Unauthorized |
/// | Expired token | 401 TokenExpired |
/// | Invalid token | 401 InvalidToken |
pub async fn require_auth(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if req.method() == http::Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let user = authenticate(state.jwt_service(), req.headers(), req.uri())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Shared by the middleware and the extractor
pub(crate) fn authenticate(
    jwt: &JwtService,
    headers: &http::HeaderMap,
    uri: &http::Uri,
) -> Result<CurrentUser, AppError> {
    let auth_header = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) => JwtService::extract_from_header(header)
            .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?,
        None => {
            security_log!("WARN", "auth_missing", uri = uri.to_string());
            return Err(AppError::unauthorized());
        }
    };

    let claims = jwt.validate_token(token).map_err(|e| {
        security_log!(
            "WARN",
            "auth_failed",
            error = e.to_string(),
            uri = uri.to_string()
        );
        match e {
            JwtError::ExpiredToken => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid token"),
        }
    })?;

    CurrentUser::try_from(claims).map_err(|e| {
        security_log!("WARN", "auth_malformed_claims", error = e.to_string());
        AppError::invalid_token(format!("Malformed JWT claims: {e}"))
    })
}

/// Require one of the given roles
///
/// ```ignore
/// Router::new()
///     .route("/api/properties", post(handler::create))
///     .route_layer(middleware::from_fn(require_role(&[Role::Admin, Role::Agent])));
/// ```
///
/// Other roles get 403 Forbidden
pub fn require_role(
    roles: &'static [Role],
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Result<Response, AppError>> + Send>>
+ Clone {
    move |req: Request, next: Next| {
        Box::pin(async move {
            let user = req
                .extensions()
                .get::<CurrentUser>()
                .ok_or(AppError::unauthorized())?;

            if !roles.contains(&user.role) {
                security_log!(
                    "WARN",
                    "role_denied",
                    user_id = user.id,
                    username = user.username.clone(),
                    user_role = user.role.as_str()
                );
                return Err(AppError::forbidden(format!(
                    "Role '{}' may not perform this action",
                    user.role
                )));
            }

            Ok(next.run(req).await)
        })
    }
}
