//! 错误类型
//!
//! - EndpointError：单个提供者调用失败（总线层 / 应用层），由协调器捕获为 Failure 结果，不向外抛出
//! - DiscoveryError：ini 配置文件无效，记录日志后跳过该文件
//! - ClientError：客户端层面的操作失败（未知提供者、总线连接、配置）

use std::path::PathBuf;

use thiserror::Error;

/// 单个提供者调用的失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// 总线层失败：无此名称 / 路径、连接断开
    #[error("Transport error: {0}")]
    Transport(String),

    /// 提供者返回了 RPC 错误
    #[error("Application error {name}: {message}")]
    Application { name: String, message: String },
}

impl EndpointError {
    /// 简短的错误类别名（用于单行展示）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TransportError",
            Self::Application { .. } => "ApplicationError",
        }
    }
}

/// 提供者发现阶段的单个文件错误
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid search pattern for {dir}: {message}")]
    Pattern { dir: PathBuf, message: String },

    #[error("Cannot read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("Missing [Shell Search Provider] section in {path}")]
    MissingSection { path: PathBuf },

    #[error("Missing key {key} in {path}")]
    MissingKey { path: PathBuf, key: &'static str },
}

/// 客户端操作错误
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Unknown search provider: {0}")]
    UnknownProvider(String),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}
