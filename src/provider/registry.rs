//! 提供者注册表
//!
//! 按身份存储 Endpoint，是会话每轮分发时的「当前全体提供者」。
//! 由发现 + 总线绑定填充，测试中手工 register。

use std::collections::HashMap;

use super::endpoint::Endpoint;
use super::identity::ProviderIdentity;

/// 注册表：ProviderIdentity → Endpoint
#[derive(Debug, Default, Clone)]
pub struct Registry {
    endpoints: HashMap<ProviderIdentity, Endpoint>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册提供者；同一身份已存在时替换并返回旧句柄
    pub fn register(&mut self, endpoint: Endpoint) -> Option<Endpoint> {
        self.endpoints.insert(endpoint.identity().clone(), endpoint)
    }

    pub fn remove(&mut self, identity: &ProviderIdentity) -> Option<Endpoint> {
        self.endpoints.remove(identity)
    }

    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.endpoints.contains_key(endpoint.identity())
    }

    /// 按 DesktopID 查找（CLI 中用户以应用 ID 指定提供者）
    pub fn find_by_desktop_id(&self, desktop_id: &str) -> Option<&Endpoint> {
        self.endpoints
            .values()
            .find(|e| e.desktop_id() == desktop_id)
    }

    /// 当前全体提供者，按身份排序
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut all: Vec<Endpoint> = self.endpoints.values().cloned().collect();
        all.sort_by(|a, b| a.identity().cmp(b.identity()));
        all
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl FromIterator<Endpoint> for Registry {
    fn from_iter<I: IntoIterator<Item = Endpoint>>(iter: I) -> Self {
        let mut registry = Self::new();
        for endpoint in iter {
            registry.register(endpoint);
        }
        registry
    }
}
