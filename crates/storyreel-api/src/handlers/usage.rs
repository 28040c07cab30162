//! Usage budget handler.

use axum::extract::State;
use axum::Json;
use storyreel_worker::UsageSnapshot;

use crate::state::AppState;

/// Today's generation calls per capability and their limits.
pub async fn get_usage(State(state): State<AppState>) -> Json<UsageSnapshot> {
    Json(state.usage.snapshot())
}
