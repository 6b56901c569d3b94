//! Web API模块
//!
//! 通过HTTP暴露配置的读取、插入与更新

use crate::manager::ConfigManager;
use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

pub mod handlers;
pub mod server;

pub use server::WebServer;

/// Web服务器状态
#[derive(Clone)]
pub struct WebState {
    /// 配置管理器
    pub manager: Arc<ConfigManager>,
    /// 启动时间
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl WebState {
    pub fn new(manager: Arc<ConfigManager>) -> Self {
        Self {
            manager,
            start_time: chrono::Utc::now(),
        }
    }
}

/// API响应
///
/// 业务错误也以200返回，由 `is_success` 区分
#[derive(Debug, Serialize)]
pub struct DataResp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub is_success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

impl DataResp {
    /// 成功响应
    pub fn success(data: Option<serde_json::Value>) -> Self {
        Self {
            data,
            is_success: true,
            error_message: String::new(),
        }
    }

    /// 失败响应
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            is_success: false,
            error_message: message.into(),
        }
    }
}

/// 创建路由
pub fn create_router(state: WebState) -> Router {
    Router::new()
        .route("/config/get", get(handlers::get_config))
        .route("/config/update", post(handlers::update_config))
        .route("/config/insert", post(handlers::insert_config))
        .route("/config/keys", get(handlers::list_configs))
        .route("/health", get(handlers::health))
        .with_state(state)
}
