// apps/dashboard/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use consultation_cell::{
    history, pending_queue, search_filter_sort_paginate, status_summary, todays_schedule, week_schedule,
    BookConsultationRequest, ConsultationRecord, ConsultationStatus, Priority, SortDirection, SortField,
    TableQuery,
};
use shared_models::error::{ApiError, AppError};

use crate::state::DashboardState;

type DashState = State<Arc<DashboardState>>;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct TableQueryParams {
    pub text: Option<String>,
    pub status: Option<ConsultationStatus>,
    pub priority: Option<Priority>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub sort: Option<SortField>,
    pub dir: Option<SortDirection>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl From<TableQueryParams> for TableQuery {
    fn from(params: TableQueryParams) -> Self {
        let defaults = TableQuery::default();
        TableQuery {
            text: params.text,
            status: params.status,
            priority: params.priority,
            from: params.from,
            to: params.to,
            sort_field: params.sort.unwrap_or(defaults.sort_field),
            sort_direction: params.dir.unwrap_or(defaults.sort_direction),
            page: params.page.unwrap_or(defaults.page),
            page_size: params.page_size.unwrap_or(defaults.page_size),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

/// Audit calls bypass the dispatcher, so a rejected token is handled here.
async fn backend_failure(state: &DashboardState, err: ApiError) -> AppError {
    if err.is_unauthorized() {
        state.client.handle_unauthorized(&err).await;
    }
    err.into()
}

async fn records(state: &DashboardState) -> Result<Vec<ConsultationRecord>, AppError> {
    state.ensure_alive()?;
    let local = state.session.state().read().await;
    Ok(local.consultations.records())
}

// ==============================================================================
// VIEW HANDLERS
// ==============================================================================

pub async fn pending_view(State(state): DashState) -> Result<Json<Value>, AppError> {
    let records = records(&state).await?;
    let pending = pending_queue(&records);

    Ok(Json(json!({
        "consultations": pending,
        "total": pending.len()
    })))
}

pub async fn today_view(State(state): DashState) -> Result<Json<Value>, AppError> {
    let records = records(&state).await?;
    let today = todays_schedule(&records, &state.projection_clock());

    Ok(Json(json!({
        "consultations": today,
        "total": today.len()
    })))
}

pub async fn week_view(State(state): DashState) -> Result<Json<Value>, AppError> {
    let records = records(&state).await?;
    let clock = state.projection_clock();
    let (start, end) = clock.week_bounds();
    let week = week_schedule(&records, &clock);

    Ok(Json(json!({
        "consultations": week,
        "total": week.len(),
        "week_start": start,
        "week_end": end
    })))
}

pub async fn history_view(State(state): DashState) -> Result<Json<Value>, AppError> {
    let records = records(&state).await?;
    let view = history(&records, &state.projection_clock(), state.config.history_recent_days);

    Ok(Json(json!(view)))
}

pub async fn summary_view(State(state): DashState) -> Result<Json<Value>, AppError> {
    let records = records(&state).await?;
    Ok(Json(json!(status_summary(&records))))
}

pub async fn table_view(
    State(state): DashState,
    Query(params): Query<TableQueryParams>,
) -> Result<Json<Value>, AppError> {
    let records = records(&state).await?;
    let query = TableQuery::from(params);
    debug!("Projecting consultation table: {:?}", query);

    Ok(Json(json!(search_filter_sort_paginate(&records, &query))))
}

// ==============================================================================
// CONSULTATION ACTIONS
// ==============================================================================

pub async fn book_consultation(
    State(state): DashState,
    Json(request): Json<BookConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    let consultation = state.dispatcher.book(request).await?;

    Ok(Json(json!({
        "message": "Consultation booked",
        "consultation": consultation
    })))
}

pub async fn accept_consultation(
    State(state): DashState,
    Path(consultation_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    let consultation = state.dispatcher.accept(&consultation_id).await?;
    Ok(Json(json!({ "consultation": consultation })))
}

pub async fn start_consultation(
    State(state): DashState,
    Path(consultation_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    let consultation = state.dispatcher.start(&consultation_id).await?;
    Ok(Json(json!({ "consultation": consultation })))
}

pub async fn complete_consultation(
    State(state): DashState,
    Path(consultation_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    let consultation = state.dispatcher.complete(&consultation_id).await?;
    Ok(Json(json!({ "consultation": consultation })))
}

pub async fn cancel_consultation(
    State(state): DashState,
    Path(consultation_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    let consultation = state.dispatcher.cancel(&consultation_id).await?;
    Ok(Json(json!({ "consultation": consultation })))
}

// ==============================================================================
// NOTIFICATION HANDLERS
// ==============================================================================

pub async fn list_notifications(State(state): DashState) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    let local = state.session.state().read().await;

    Ok(Json(json!({
        "notifications": local.notifications,
        "unread_count": local.unread_count
    })))
}

pub async fn mark_notification_read(
    State(state): DashState,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    state.dispatcher.mark_notification_read(&notification_id).await?;
    Ok(Json(json!({ "message": "Notification marked as read" })))
}

pub async fn mark_all_read(State(state): DashState) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    state.dispatcher.mark_all_read().await?;
    Ok(Json(json!({ "message": "All notifications marked as read" })))
}

pub async fn clear_notifications(State(state): DashState) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    state.dispatcher.clear_all().await?;
    Ok(Json(json!({ "message": "All notifications cleared" })))
}

// ==============================================================================
// AUDIT AND STATUS
// ==============================================================================

pub async fn audit_trail(
    State(state): DashState,
    Path(subject_id): Path<String>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    let trail = match state
        .audit
        .trail(&subject_id, query.skip.unwrap_or(0), query.limit.unwrap_or(0))
        .await
    {
        Ok(trail) => trail,
        Err(e) => return Err(backend_failure(&state, e).await),
    };

    Ok(Json(json!(trail)))
}

pub async fn audit_stats(State(state): DashState) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    let stats = match state.audit.stats().await {
        Ok(stats) => stats,
        Err(e) => return Err(backend_failure(&state, e).await),
    };
    Ok(Json(json!(stats)))
}

/// Freshness of both collections, local pending changes and the alert ledger.
pub async fn sync_status(State(state): DashState) -> Result<Json<Value>, AppError> {
    state.ensure_alive()?;
    Ok(Json(json!(state.session.snapshot().await)))
}
