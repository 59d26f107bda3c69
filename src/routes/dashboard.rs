use axum::{extract::State, Json};

use crate::db::stats::{self, DashboardStats};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /dashboard/stats
pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(stats::dashboard(state.db()?).await?))
}
