//! Web服务器实现

use super::{create_router, WebState};
use crate::config::WebConfig;
use crate::manager::ConfigManager;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

/// Web服务器
pub struct WebServer {
    /// 配置
    config: WebConfig,
    /// 配置管理器
    manager: Arc<ConfigManager>,
    /// 关闭信号接收器
    shutdown_rx: Option<broadcast::Receiver<()>>,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(
        config: WebConfig,
        manager: Arc<ConfigManager>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            manager,
            shutdown_rx: Some(shutdown_rx),
        }
    }

    /// 绑定监听地址并运行，直到收到关闭信号
    pub async fn start(&mut self) -> anyhow::Result<()> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .map_err(|e| anyhow::anyhow!(e))?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("绑定监听地址失败: {addr}"))?;
        self.serve(listener).await
    }

    /// 在已绑定的监听器上运行
    pub async fn serve(&mut self, listener: TcpListener) -> anyhow::Result<()> {
        let mut shutdown_rx = self
            .shutdown_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("关闭信号接收器已被使用"))?;

        let local_addr = listener.local_addr().context("获取监听地址失败")?;
        let router = create_router(WebState::new(Arc::clone(&self.manager)));

        info!("Web服务器已启动: http://{}", local_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await
            .context("Web服务器运行失败")?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
