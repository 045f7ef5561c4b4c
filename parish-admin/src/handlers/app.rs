use axum::{response::Redirect, Json};
use serde_json::{json, Value};

pub async fn index() -> Redirect {
    Redirect::to("/admin")
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "parish-admin",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
