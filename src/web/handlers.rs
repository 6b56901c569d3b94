//! HTTP请求处理器

use super::{DataResp, WebState};
use axum::{
    extract::{Query, State},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct GetParams {
    #[serde(default)]
    pub config_key: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteParams {
    #[serde(default)]
    pub config_key: String,
    #[serde(default)]
    pub config_value: String,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub mode: String,
    /// 后台监听任务是否仍在运行
    pub watching: bool,
    pub last_reload_unix: i64,
    pub uptime_seconds: i64,
}

pub async fn get_config(
    State(state): State<WebState>,
    Query(params): Query<GetParams>,
) -> Json<DataResp> {
    match state.manager.get_config(&params.config_key) {
        Ok(value) => Json(DataResp::success(Some(value.to_json()))),
        Err(e) => Json(DataResp::error(e.to_string())),
    }
}

pub async fn update_config(
    State(state): State<WebState>,
    Form(params): Form<WriteParams>,
) -> Json<DataResp> {
    match state
        .manager
        .update_config(&params.config_key, &params.config_value)
        .await
    {
        Ok(()) => Json(DataResp::success(None)),
        Err(e) => {
            warn!(key = %params.config_key, error = %e, "更新配置失败");
            Json(DataResp::error(e.to_string()))
        }
    }
}

pub async fn insert_config(
    State(state): State<WebState>,
    Form(params): Form<WriteParams>,
) -> Json<DataResp> {
    match state
        .manager
        .insert_config(&params.config_key, &params.config_value)
        .await
    {
        Ok(()) => Json(DataResp::success(None)),
        Err(e) => {
            warn!(key = %params.config_key, error = %e, "插入配置失败");
            Json(DataResp::error(e.to_string()))
        }
    }
}

/// 列出所有配置的当前值
pub async fn list_configs(State(state): State<WebState>) -> Json<DataResp> {
    let snapshot: serde_json::Map<String, serde_json::Value> = state
        .manager
        .snapshot()
        .into_iter()
        .map(|(key, value)| (key, value.to_json()))
        .collect();
    Json(DataResp::success(Some(json!(snapshot))))
}

pub async fn health(State(state): State<WebState>) -> Json<HealthStatus> {
    let watching = state.manager.is_watching();
    Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if watching { "operational" } else { "degraded" },
        mode: state.manager.mode().to_string(),
        watching,
        last_reload_unix: state.manager.last_reload_unix(),
        uptime_seconds: (chrono::Utc::now() - state.start_time).num_seconds(),
    })
}
