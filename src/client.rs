//! 搜索客户端：注册表 + 会话 + 按 DesktopID 的元数据 / 激活 / 启动
//!
//! 启用 `dbus` 特性时可由配置直接建立：发现提供者 → 连接会话总线 → 绑定代理。

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{ClientError, SearchSession, SessionRound};
use crate::provider::{Endpoint, Registry, ResultMeta};

/// 搜索客户端
pub struct SearchClient {
    session: SearchSession,
    /// 持有会话总线连接，使各提供者的代理保持可用
    #[cfg(feature = "dbus")]
    connection: Option<zbus::Connection>,
}

impl SearchClient {
    pub fn new(registry: Registry, deadline: Duration) -> Self {
        Self {
            session: SearchSession::new(registry, deadline),
            #[cfg(feature = "dbus")]
            connection: None,
        }
    }

    /// 用配置中的截止时间创建
    pub fn with_config(registry: Registry, config: &AppConfig) -> Self {
        Self::new(registry, config.search.deadline())
    }

    /// 每轮绑定取消信号（如 ShutdownManager 的 token）
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.session = self.session.with_cancellation(token);
        self
    }

    /// 发现提供者并连接会话总线
    #[cfg(feature = "dbus")]
    pub async fn connect(config: &AppConfig) -> Result<Self, ClientError> {
        use crate::provider::{connect_registry, discover, search_provider_dirs, session_connection};

        let dirs = search_provider_dirs(config.discovery.data_dirs.as_deref());
        let identities = discover(&dirs);
        let connection = session_connection().await?;
        let registry = connect_registry(&connection, identities).await;
        tracing::info!(providers = registry.len(), "Search client connected");

        let mut client = Self::with_config(registry, config);
        client.connection = Some(connection);
        Ok(client)
    }

    /// 由 `connect` 建立的总线连接，可用于绑定后来出现的提供者
    #[cfg(feature = "dbus")]
    pub fn connection(&self) -> Option<&zbus::Connection> {
        self.connection.as_ref()
    }

    pub fn providers(&self) -> Vec<Endpoint> {
        self.session.registry().endpoints()
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SearchSession {
        &mut self.session
    }

    pub fn initial(&mut self, terms: &[String]) -> SessionRound<'_> {
        self.session.initial(terms)
    }

    pub fn refine(&mut self, terms: &[String]) -> SessionRound<'_> {
        self.session.refine(terms)
    }

    fn provider(&self, desktop_id: &str) -> Result<Endpoint, ClientError> {
        self.session
            .registry()
            .find_by_desktop_id(desktop_id)
            .cloned()
            .ok_or_else(|| ClientError::UnknownProvider(desktop_id.to_string()))
    }

    pub async fn result_metas(
        &self,
        desktop_id: &str,
        ids: &[String],
    ) -> Result<Vec<ResultMeta>, ClientError> {
        let endpoint = self.provider(desktop_id)?;
        Ok(endpoint.fetch_metadata(ids).await?)
    }

    pub async fn activate(
        &self,
        desktop_id: &str,
        id: &str,
        terms: &[String],
        timestamp: u32,
    ) -> Result<(), ClientError> {
        let endpoint = self.provider(desktop_id)?;
        tracing::info!(provider = desktop_id, id, "Activating search result");
        Ok(endpoint.activate(id, terms, timestamp).await?)
    }

    pub async fn launch(
        &self,
        desktop_id: &str,
        terms: &[String],
        timestamp: u32,
    ) -> Result<(), ClientError> {
        let endpoint = self.provider(desktop_id)?;
        tracing::info!(provider = desktop_id, "Launching provider search");
        Ok(endpoint.launch(terms, timestamp).await?)
    }
}
