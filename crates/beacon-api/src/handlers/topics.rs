//! Topic catalogue handler.

use axum::Json;
use axum::extract::State;

use crate::dto::response::TopicsResponse;
use crate::state::AppState;

/// GET /api/topics
pub async fn list_topics(State(state): State<AppState>) -> Json<TopicsResponse> {
    let topics = state.realtime.registry.list();
    Json(TopicsResponse {
        count: topics.len(),
        topics,
    })
}
