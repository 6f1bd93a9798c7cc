//! 提供者调用面：SearchProvider2 的六个方法
//!
//! 所有后端（D-Bus / Mock）实现 SearchEndpoint；每个方法是一次远程调用，
//! 挂起期间丢弃其 future 即取消该调用。Endpoint 是可克隆的共享句柄，按身份比较。

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;

use super::identity::ProviderIdentity;
use super::meta::ResultMeta;
use crate::core::EndpointError;

/// 单个搜索提供者的远程接口
#[async_trait]
pub trait SearchEndpoint: Send + Sync {
    /// 提供者身份
    fn identity(&self) -> &ProviderIdentity;

    /// 预热（Load），默认直接成功
    async fn load(&self) -> Result<(), EndpointError> {
        Ok(())
    }

    /// 冷启动搜索（GetInitialResultSet）
    async fn query(&self, terms: &[String]) -> Result<Vec<String>, EndpointError>;

    /// 在上一轮结果上细化（GetSubsearchResultSet）
    async fn refine(
        &self,
        previous_ids: &[String],
        terms: &[String],
    ) -> Result<Vec<String>, EndpointError>;

    /// 结果元数据（GetResultMetas），每个 id 对应一条
    async fn fetch_metadata(&self, ids: &[String]) -> Result<Vec<ResultMeta>, EndpointError>;

    /// 在应用中打开结果（ActivateResult）
    async fn activate(&self, id: &str, terms: &[String], timestamp: u32)
        -> Result<(), EndpointError>;

    /// 请求应用自行展示更多结果（LaunchSearch）
    async fn launch(&self, terms: &[String], timestamp: u32) -> Result<(), EndpointError>;
}

/// 提供者句柄：Arc<dyn SearchEndpoint>，相等性与哈希只看身份
#[derive(Clone)]
pub struct Endpoint(Arc<dyn SearchEndpoint>);

impl Endpoint {
    pub fn new(inner: impl SearchEndpoint + 'static) -> Self {
        Self(Arc::new(inner))
    }

    pub fn identity(&self) -> &ProviderIdentity {
        self.0.identity()
    }

    pub fn desktop_id(&self) -> &str {
        &self.identity().desktop_id
    }

    pub fn bus_name(&self) -> &str {
        &self.identity().bus_name
    }

    pub fn object_path(&self) -> &str {
        &self.identity().object_path
    }

    pub async fn load(&self) -> Result<(), EndpointError> {
        self.0.load().await
    }

    pub async fn query(&self, terms: &[String]) -> Result<Vec<String>, EndpointError> {
        self.0.query(terms).await
    }

    pub async fn refine(
        &self,
        previous_ids: &[String],
        terms: &[String],
    ) -> Result<Vec<String>, EndpointError> {
        self.0.refine(previous_ids, terms).await
    }

    pub async fn fetch_metadata(&self, ids: &[String]) -> Result<Vec<ResultMeta>, EndpointError> {
        self.0.fetch_metadata(ids).await
    }

    pub async fn activate(
        &self,
        id: &str,
        terms: &[String],
        timestamp: u32,
    ) -> Result<(), EndpointError> {
        self.0.activate(id, terms, timestamp).await
    }

    pub async fn launch(&self, terms: &[String], timestamp: u32) -> Result<(), EndpointError> {
        self.0.launch(terms, timestamp).await
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Endpoint").field(self.identity()).finish()
    }
}
