use axum::{
    RequestExt,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use sprout_services::{CurrentUser, Error, Services};

use crate::error::ApiError;

/// The bearer token a request was authenticated with.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Validate the bearer token and attach the caller's identity.
pub async fn require_auth(
    State(services): State<Services>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = req
        .extract_parts::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| Error::Unauthenticated)?;

    let token = bearer.token().to_string();
    let user = services.sessions.validate_token(&token).await?;

    req.extensions_mut().insert(CurrentUser(user));
    req.extensions_mut().insert(SessionToken(token));
    Ok(next.run(req).await)
}
