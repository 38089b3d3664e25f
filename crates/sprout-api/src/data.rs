use axum::{
    Extension, Json,
    extract::{Query, State},
};

use sprout_services::{CurrentUser, Services};
use sprout_types::api::DataQuery;
use sprout_types::models::DataPoint;

use crate::error::ApiError;

pub async fn capacitance(
    State(services): State<Services>,
    Extension(who): Extension<CurrentUser>,
    Query(query): Query<DataQuery>,
) -> Result<Json<Vec<DataPoint>>, ApiError> {
    let device = services.provisioning.get_user_device(&who, query.device_id).await?;
    let points = services
        .telemetry
        .capacitance_since(device.id, query.start_time)
        .await?;
    Ok(Json(points))
}

pub async fn temperature(
    State(services): State<Services>,
    Extension(who): Extension<CurrentUser>,
    Query(query): Query<DataQuery>,
) -> Result<Json<Vec<DataPoint>>, ApiError> {
    let device = services.provisioning.get_user_device(&who, query.device_id).await?;
    let points = services
        .telemetry
        .temperature_since(device.id, query.start_time)
        .await?;
    Ok(Json(points))
}
