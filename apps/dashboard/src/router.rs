// apps/dashboard/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::handlers;
use crate::state::DashboardState;

pub fn create_router(state: Arc<DashboardState>) -> Router {
    let views = Router::new()
        .route("/pending", get(handlers::pending_view))
        .route("/today", get(handlers::today_view))
        .route("/week", get(handlers::week_view))
        .route("/history", get(handlers::history_view))
        .route("/summary", get(handlers::summary_view))
        .route("/table", get(handlers::table_view));

    let consultations = Router::new()
        .route("/", post(handlers::book_consultation))
        .route("/{consultation_id}/accept", post(handlers::accept_consultation))
        .route("/{consultation_id}/start", post(handlers::start_consultation))
        .route("/{consultation_id}/complete", post(handlers::complete_consultation))
        .route("/{consultation_id}/cancel", post(handlers::cancel_consultation));

    let notifications = Router::new()
        .route("/", get(handlers::list_notifications))
        .route("/", delete(handlers::clear_notifications))
        .route("/read-all", post(handlers::mark_all_read))
        .route("/{notification_id}/read", post(handlers::mark_notification_read));

    Router::new()
        .route("/", get(|| async { "Amae consultation dashboard is running!" }))
        .nest("/views", views)
        .nest("/consultations", consultations)
        .nest("/notifications", notifications)
        .route("/audit/stats", get(handlers::audit_stats))
        .route("/audit/{subject_id}", get(handlers::audit_trail))
        .route("/sync/status", get(handlers::sync_status))
        .with_state(state)
}
