use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use sprout_services::{CurrentUser, Services};
use sprout_types::api::{ProvisionQuery, ProvisionResponse, RenameDeviceRequest};
use sprout_types::models::{Breadcrumb, Device};

use crate::error::ApiError;

pub async fn list_devices(
    State(services): State<Services>,
    Extension(who): Extension<CurrentUser>,
) -> Result<Json<Vec<Device>>, ApiError> {
    Ok(Json(services.provisioning.get_user_devices(&who).await?))
}

pub async fn get_device(
    State(services): State<Services>,
    Extension(who): Extension<CurrentUser>,
    Path(device_id): Path<i64>,
) -> Result<Json<Device>, ApiError> {
    Ok(Json(services.provisioning.get_user_device(&who, device_id).await?))
}

pub async fn rename_device(
    State(services): State<Services>,
    Extension(who): Extension<CurrentUser>,
    Path(device_id): Path<i64>,
    Json(req): Json<RenameDeviceRequest>,
) -> Result<Json<Device>, ApiError> {
    let device = services
        .provisioning
        .rename_device(&who, device_id, &req.display_name)
        .await?;
    Ok(Json(device))
}

pub async fn create_provision(
    State(services): State<Services>,
    Extension(who): Extension<CurrentUser>,
    Query(query): Query<ProvisionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = services
        .provisioning
        .create_device_provision(&who, &query.display_name)
        .await?;
    Ok((StatusCode::CREATED, Json(ProvisionResponse { contract })))
}

pub async fn latest_breadcrumb(
    State(services): State<Services>,
    Extension(who): Extension<CurrentUser>,
    Path(device_id): Path<i64>,
) -> Result<Json<Breadcrumb>, ApiError> {
    let device = services.provisioning.get_user_device(&who, device_id).await?;
    Ok(Json(services.telemetry.get_latest_breadcrumb(device.id).await?))
}
