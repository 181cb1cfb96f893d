use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::state::AppState;
use crate::util::unix_now_secs;

const MODEL_OWNER: &str = "google-gemini-cli";

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub owned_by: &'static str,
}

/// List registry models in `OpenAI` format, in registry order.
pub fn handler(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    let created = unix_now_secs();
    let data = state
        .models()
        .list_model_ids()
        .into_iter()
        .map(|id| ModelEntry {
            id,
            object: "model",
            created,
            owned_by: MODEL_OWNER,
        })
        .collect();
    Json(ModelList {
        object: "list",
        data,
    })
}
