//! GNOME Shell 搜索提供者客户端
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 单轮分发 / 汇聚、跨轮会话状态、结果与错误类型
//! - **provider**: 提供者身份、调用接口、注册表、发现（ini）、D-Bus / Mock 后端
//! - **client**: 组合注册表与会话的客户端
//! - **observability**: 日志初始化
//! - **shutdown**: 关闭信号（取消进行中的搜索）

pub mod client;
pub mod config;
pub mod core;
pub mod observability;
pub mod provider;
pub mod shutdown;

pub use client::SearchClient;
pub use crate::core::{ProviderResponse, QueryCoordinator, QueryOutcome, SearchSession};
pub use provider::{Endpoint, ProviderIdentity, Registry, SearchEndpoint};
