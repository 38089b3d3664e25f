use axum::{
    Extension, Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use tracing::{info, warn};

use sprout_services::templates::CHANGE_PW_PAGE;
use sprout_services::{Error, Services};
use sprout_types::api::{
    ChangePwForm, ChangePwQuery, CreateUserRequest, ForgotPwQuery, LoginRequest, LoginResponse,
};

use crate::error::ApiError;
use crate::middleware::SessionToken;

pub async fn create_user(
    State(services): State<Services>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = services
        .sessions
        .create_user(&req.email, &req.password, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(services): State<Services>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token = services.sessions.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse { token }))
}

pub async fn logout(
    State(services): State<Services>,
    Extension(SessionToken(token)): Extension<SessionToken>,
) -> Result<StatusCode, ApiError> {
    services.sessions.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Always answers 200 for unknown emails so the endpoint cannot be used to
/// probe which addresses are registered.
pub async fn forgot_pw(
    State(services): State<Services>,
    Query(query): Query<ForgotPwQuery>,
) -> Result<StatusCode, ApiError> {
    match services.sessions.forgot_pw(&query.email).await {
        Ok(()) | Err(Error::NoUser) => Ok(StatusCode::OK),
        Err(e) => Err(e.into()),
    }
}

pub async fn change_pw_page(
    State(services): State<Services>,
    Query(query): Query<ChangePwQuery>,
) -> Result<Html<String>, ApiError> {
    let user = services.sessions.reset_token_owner(&query.token).await?;
    render_change_page(&services, &user.name, false, None)
}

pub async fn change_pw(
    State(services): State<Services>,
    Query(query): Query<ChangePwQuery>,
    Form(form): Form<ChangePwForm>,
) -> Result<Response, ApiError> {
    let user = services.sessions.reset_token_owner(&query.token).await?;

    if form.pw1 != form.pw2 {
        let page = render_change_page(&services, &user.name, false, Some("Passwords do not match"))?;
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    }

    match services.sessions.change_pw(&query.token, &form.pw1).await {
        Ok(()) => {}
        Err(Error::ResetCleanup(e)) => {
            warn!(user_id = user.id, "password changed but reset tokens remain: {:#}", e);
        }
        Err(Error::InvalidInput(msg)) => {
            let page = render_change_page(&services, &user.name, false, Some(msg))?;
            return Ok((StatusCode::BAD_REQUEST, page).into_response());
        }
        Err(e) => return Err(e.into()),
    }

    info!(user_id = user.id, "password reset completed");
    Ok(render_change_page(&services, &user.name, true, None)?.into_response())
}

fn render_change_page(
    services: &Services,
    username: &str,
    changed: bool,
    error: Option<&str>,
) -> Result<Html<String>, ApiError> {
    services
        .templates
        .render(
            CHANGE_PW_PAGE,
            json!({ "username": username, "changed": changed, "error": error }),
        )
        .map(Html)
        .map_err(|e| Error::Template(e).into())
}
