//! Request authentication for the REST API.

use api_shared::auth::{bearer_token, AuthError};
use api_shared::{authorize, Claims, ErrorRes, JwtKeys, Role};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};

/// The authenticated caller, taken from the `Authorization: Bearer` header.
///
/// Extraction fails with 401 when the token is missing or does not verify. Handlers then call
/// [`AuthUser::require`] with the roles allowed for the endpoint.
#[derive(Clone, Debug)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn require(&self, allowed: &[Role]) -> Result<(), AuthRejection> {
        authorize(&self.0, allowed).map_err(AuthRejection)
    }

    pub fn subject(&self) -> &str {
        &self.0.sub
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header).map_err(AuthRejection)?;
        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(AuthRejection)?;
        Ok(AuthUser(claims))
    }
}

#[derive(Debug)]
pub struct AuthRejection(pub AuthError);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, msg) = match &self.0 {
            AuthError::Forbidden(role) => {
                tracing::debug!("rejected {} caller", role);
                (StatusCode::FORBIDDEN, "Permission denied".to_string())
            }
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "invalid token".to_string()),
            AuthError::Signing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()),
        };
        (status, Json(ErrorRes::new(msg))).into_response()
    }
}
