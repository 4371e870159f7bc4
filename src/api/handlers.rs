use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::OpenApi;

use super::{
    dto::{
        AlertDto, FridgeDetailDto, FridgeDto, FridgeOverviewDto, FridgeStatsDto,
        MaintenanceRecordDto, MaintenanceRequest, ReadingDto, SettingsResponse, StatusResponse,
    },
    errors::AppError,
};
use crate::{
    db::{
        alerts, fridges, maintenance,
        models::{AlertType, Fridge},
    },
    monitor::{settings::SettingsUpdate, MonitorContext, MonitorError},
    stats::{self, DailyStats, TemperatureSeries},
};

/// Alerts listed in a fridge's detail view.
const RECENT_ALERTS: i64 = 10;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Day counts arrive as free text; anything unparsable means one day.
fn days_or_default(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(1)
}

#[derive(Debug, Deserialize)]
pub struct DurationParams {
    pub duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DaysParams {
    pub days: Option<String>,
}

async fn find_fridge(pool: &SqlitePool, id: i64) -> Result<Fridge, AppError> {
    fridges::find(pool, id)
        .await?
        .ok_or_else(|| MonitorError::FridgeNotFound(id).into())
}

async fn active_alerts(pool: &SqlitePool, fridge_id: i64) -> Result<Vec<AlertDto>, AppError> {
    let rows = alerts::active_for_fridge(pool, fridge_id).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

// ---------------------------------------------------------------------------
// Fridges
// ---------------------------------------------------------------------------

/// Dashboard overview of every fridge.
#[utoipa::path(
    get,
    path = "/api/fridges",
    responses(
        (status = 200, description = "One entry per fridge", body = Vec<FridgeOverviewDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "fridges"
)]
pub async fn list_fridges(
    State(ctx): State<MonitorContext>,
) -> Result<Json<Vec<FridgeOverviewDto>>, AppError> {
    let pool = ctx.pool();
    let now = Utc::now();

    let mut overview = Vec::new();
    for fridge in fridges::list(pool).await? {
        overview.push(FridgeOverviewDto {
            current_reading: stats::current_reading(pool, fridge.id).await?.map(Into::into),
            stats: stats::daily_stats(pool, &fridge, now).await?,
            days_until_maintenance: fridge.days_until_maintenance(now),
            active_alerts: active_alerts(pool, fridge.id).await?,
            door_open: stats::is_door_open(pool, fridge.id).await?,
            fridge: fridge.into(),
        });
    }
    Ok(Json(overview))
}

/// Everything known about one fridge. `?duration=N` selects N days of chart data.
#[utoipa::path(
    get,
    path = "/api/fridges/{id}",
    params(
        ("id" = i64, Path, description = "Fridge ID"),
        ("duration" = Option<i64>, Query, description = "Days of temperature history (default 1)"),
    ),
    responses(
        (status = 200, description = "Fridge detail", body = FridgeDetailDto),
        (status = 404, description = "Fridge not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "fridges"
)]
pub async fn get_fridge(
    State(ctx): State<MonitorContext>,
    Path(id): Path<i64>,
    Query(params): Query<DurationParams>,
) -> Result<Json<FridgeDetailDto>, AppError> {
    let pool = ctx.pool();
    let now = Utc::now();
    let fridge = find_fridge(pool, id).await?;
    let duration = days_or_default(params.duration.as_deref());

    let detail = FridgeDetailDto {
        current_reading: stats::current_reading(pool, id).await?.map(ReadingDto::from),
        temperature_data: stats::temperature_series(pool, id, duration, now).await?,
        duration,
        stats: stats::daily_stats(pool, &fridge, now).await?,
        days_until_maintenance: fridge.days_until_maintenance(now),
        maintenance_history: maintenance::history(pool, id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect(),
        active_alerts: active_alerts(pool, id).await?,
        recent_alerts: alerts::recent_for_fridge(pool, id, RECENT_ALERTS)
            .await?
            .into_iter()
            .map(Into::into)
            .collect(),
        door_open: stats::is_door_open(pool, id).await?,
        recovery_time: stats::last_recovery_time(pool, &fridge).await?,
        fridge: fridge.into(),
    };
    Ok(Json(detail))
}

/// Update a fridge's settings. Absent fields are left unchanged.
#[utoipa::path(
    put,
    path = "/api/fridges/{id}",
    params(("id" = i64, Path, description = "Fridge ID")),
    request_body = SettingsUpdate,
    responses(
        (status = 200, description = "Saved settings and any warnings", body = SettingsResponse),
        (status = 400, description = "Invalid value"),
        (status = 404, description = "Fridge not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "fridges"
)]
pub async fn update_fridge(
    State(ctx): State<MonitorContext>,
    Path(id): Path<i64>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsResponse>, AppError> {
    let outcome = ctx.update_settings(id, update).await?;
    Ok(Json(SettingsResponse {
        fridge: outcome.fridge.into(),
        warnings: outcome.warnings,
    }))
}

// ---------------------------------------------------------------------------
// Readings & stats
// ---------------------------------------------------------------------------

/// Chart data: readings from the last `?days=N` days (default 1), oldest first.
#[utoipa::path(
    get,
    path = "/api/temperature_data/{id}",
    params(
        ("id" = i64, Path, description = "Fridge ID"),
        ("days" = Option<i64>, Query, description = "Days of history (default 1)"),
    ),
    responses(
        (status = 200, description = "Parallel timestamp/temperature/humidity arrays", body = TemperatureSeries),
        (status = 404, description = "Fridge not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn get_temperature_data(
    State(ctx): State<MonitorContext>,
    Path(id): Path<i64>,
    Query(params): Query<DaysParams>,
) -> Result<Json<TemperatureSeries>, AppError> {
    let pool = ctx.pool();
    find_fridge(pool, id).await?;
    let days = days_or_default(params.days.as_deref());
    Ok(Json(stats::temperature_series(pool, id, days, Utc::now()).await?))
}

/// Today's statistics plus the live state of the fridge.
#[utoipa::path(
    get,
    path = "/api/stats/{id}",
    params(("id" = i64, Path, description = "Fridge ID")),
    responses(
        (status = 200, description = "Current stats", body = FridgeStatsDto),
        (status = 404, description = "Fridge not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn get_stats(
    State(ctx): State<MonitorContext>,
    Path(id): Path<i64>,
) -> Result<Json<FridgeStatsDto>, AppError> {
    let pool = ctx.pool();
    let fridge = find_fridge(pool, id).await?;
    let daily = stats::daily_stats(pool, &fridge, Utc::now()).await?;
    let current = stats::current_reading(pool, id).await?;
    let door_open = stats::is_door_open(pool, id).await?;

    Ok(Json(FridgeStatsDto::new(daily, current.as_ref(), door_open, &fridge)))
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Unacknowledged alerts for a fridge, newest first.
#[utoipa::path(
    get,
    path = "/api/alerts/{id}",
    params(("id" = i64, Path, description = "Fridge ID")),
    responses(
        (status = 200, description = "Active alerts", body = Vec<AlertDto>),
        (status = 404, description = "Fridge not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "alerts"
)]
pub async fn get_alerts(
    State(ctx): State<MonitorContext>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<AlertDto>>, AppError> {
    let pool = ctx.pool();
    find_fridge(pool, id).await?;
    Ok(Json(active_alerts(pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/alerts/{id}/acknowledge",
    params(("id" = i64, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert acknowledged", body = StatusResponse),
        (status = 404, description = "Alert not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "alerts"
)]
pub async fn acknowledge_alert(
    State(ctx): State<MonitorContext>,
    Path(id): Path<i64>,
) -> Result<Json<StatusResponse>, AppError> {
    ctx.acknowledge_alert(id).await?;
    Ok(Json(StatusResponse::ok()))
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// Log a maintenance visit and restart the maintenance interval.
#[utoipa::path(
    post,
    path = "/api/fridges/{id}/maintenance",
    params(("id" = i64, Path, description = "Fridge ID")),
    request_body = MaintenanceRequest,
    responses(
        (status = 200, description = "Stored maintenance record", body = MaintenanceRecordDto),
        (status = 404, description = "Fridge not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "maintenance"
)]
pub async fn log_maintenance(
    State(ctx): State<MonitorContext>,
    Path(id): Path<i64>,
    Json(body): Json<MaintenanceRequest>,
) -> Result<Json<MaintenanceRecordDto>, AppError> {
    let record = ctx
        .log_maintenance(id, &body.description, &body.performed_by, Utc::now())
        .await?;
    Ok(Json(record.into()))
}

/// Restart the maintenance interval without logging a visit.
#[utoipa::path(
    post,
    path = "/api/fridges/{id}/maintenance/reset",
    params(("id" = i64, Path, description = "Fridge ID")),
    responses(
        (status = 200, description = "Updated fridge", body = FridgeDto),
        (status = 404, description = "Fridge not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "maintenance"
)]
pub async fn reset_maintenance(
    State(ctx): State<MonitorContext>,
    Path(id): Path<i64>,
) -> Result<Json<FridgeDto>, AppError> {
    ctx.reset_maintenance_date(id, Utc::now()).await?;
    Ok(Json(find_fridge(ctx.pool(), id).await?.into()))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = StatusResponse),
    ),
    tag = "system"
)]
pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        list_fridges,
        get_fridge,
        update_fridge,
        get_temperature_data,
        get_stats,
        get_alerts,
        acknowledge_alert,
        log_maintenance,
        reset_maintenance,
        health,
    ),
    components(schemas(
        FridgeDto,
        ReadingDto,
        AlertDto,
        AlertType,
        MaintenanceRecordDto,
        FridgeOverviewDto,
        FridgeDetailDto,
        FridgeStatsDto,
        DailyStats,
        TemperatureSeries,
        SettingsUpdate,
        SettingsResponse,
        MaintenanceRequest,
        StatusResponse,
    )),
    tags(
        (name = "fridges", description = "Fridge overview, detail and settings"),
        (name = "readings", description = "Temperature history and statistics"),
        (name = "alerts", description = "Active alerts and acknowledgement"),
        (name = "maintenance", description = "Maintenance logging"),
        (name = "system", description = "System endpoints"),
    ),
    info(
        title = "Fridge Monitor API",
        version = "0.1.0",
        description = "REST API for refrigerator temperature, door and maintenance monitoring"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
