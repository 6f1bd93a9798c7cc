//! 单个提供者在一轮中的结果
//!
//! 提供者错误以 Failure 值返回，而不是作为错误向上传播；
//! 超时未返回的提供者没有结果（既不是 Success 也不是 Failure）。

use std::fmt;
use std::sync::Arc;

use crate::core::EndpointError;
use crate::provider::Endpoint;

/// 单个提供者的调用结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome<T = Vec<String>> {
    Success(T),
    Failure(EndpointError),
}

impl<T> QueryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&EndpointError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(err) => Some(err),
        }
    }
}

impl<T> From<Result<T, EndpointError>> for QueryOutcome<T> {
    fn from(result: Result<T, EndpointError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err),
        }
    }
}

impl QueryOutcome<Vec<String>> {
    /// 可用于细化的结果 ID：成功且非空
    pub fn refinable_ids(&self) -> Option<&[String]> {
        match self {
            Self::Success(ids) if !ids.is_empty() => Some(ids),
            _ => None,
        }
    }
}

/// 一轮中产出的一项：哪个提供者、本轮的搜索词、结果
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub endpoint: Endpoint,
    pub terms: Arc<[String]>,
    pub outcome: QueryOutcome,
}

impl ProviderResponse {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn ids(&self) -> Option<&[String]> {
        self.outcome.success().map(Vec::as_slice)
    }
}

impl fmt::Display for ProviderResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            QueryOutcome::Success(ids) => {
                write!(f, "{}: {} results", self.endpoint.desktop_id(), ids.len())
            }
            QueryOutcome::Failure(err) => {
                write!(f, "{}: {}", self.endpoint.desktop_id(), err.kind())
            }
        }
    }
}
