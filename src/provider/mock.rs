//! Mock 提供者（用于测试，无需 D-Bus）
//!
//! 可设定延迟、返回结果、失败或永不返回；通过 MockRecorder 观察调用记录，
//! 以及挂起中的调用是否被取消（future 在完成前被丢弃）。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::endpoint::SearchEndpoint;
use super::identity::ProviderIdentity;
use super::meta::ResultMeta;
use crate::core::EndpointError;

/// 一次搜索调用的脚本化行为
#[derive(Debug, Clone)]
pub enum MockReply {
    Ids(Vec<String>),
    Fail(EndpointError),
    /// 永不返回，只能被取消
    Hang,
}

/// 被记录下来的调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Query(Vec<String>),
    Refine {
        previous: Vec<String>,
        terms: Vec<String>,
    },
    Metas(Vec<String>),
    Activate {
        id: String,
        terms: Vec<String>,
        timestamp: u32,
    },
    Launch {
        terms: Vec<String>,
        timestamp: u32,
    },
}

/// 调用观察句柄（与 MockEndpoint 共享计数）
#[derive(Debug, Clone, Default)]
pub struct MockRecorder {
    calls: Arc<Mutex<Vec<MockCall>>>,
    cancelled: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl MockRecorder {
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn query_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Query(_)))
            .count()
    }

    pub fn refine_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Refine { .. }))
            .count()
    }

    /// 在完成前被丢弃的搜索调用数
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 正常返回（成功或失败）的搜索调用数
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// 已开始但既未完成也未取消的调用数
    pub fn in_flight(&self) -> usize {
        let started = self.query_count() + self.refine_count();
        started - self.cancelled() - self.completed()
    }

    fn record(&self, call: MockCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

/// 丢弃时若调用尚未完成则计为取消
struct CallGuard {
    recorder: MockRecorder,
    finished: bool,
}

impl CallGuard {
    fn new(recorder: &MockRecorder) -> Self {
        Self {
            recorder: recorder.clone(),
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
        self.recorder.completed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.recorder.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// 脚本化提供者
#[derive(Debug, Clone)]
pub struct MockEndpoint {
    identity: ProviderIdentity,
    delay: Duration,
    query_reply: MockReply,
    refine_reply: Option<MockReply>,
    metas: Vec<ResultMeta>,
    recorder: MockRecorder,
}

impl MockEndpoint {
    /// 以短名创建，身份为 `<name>.desktop` / `org.example.<name>` / `/org/example/<name>`
    pub fn new(name: &str) -> Self {
        Self::with_identity(ProviderIdentity::new(
            format!("{name}.desktop"),
            format!("org.example.{name}"),
            format!("/org/example/{name}"),
        ))
    }

    pub fn with_identity(identity: ProviderIdentity) -> Self {
        Self {
            identity,
            delay: Duration::ZERO,
            query_reply: MockReply::Ids(Vec::new()),
            refine_reply: None,
            metas: Vec::new(),
            recorder: MockRecorder::default(),
        }
    }

    /// 每次搜索调用的延迟
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_results<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_reply = MockReply::Ids(ids.into_iter().map(Into::into).collect());
        self
    }

    /// 细化调用的返回；未设置时与冷启动相同
    pub fn with_refine_reply(mut self, reply: MockReply) -> Self {
        self.refine_reply = Some(reply);
        self
    }

    pub fn with_reply(mut self, reply: MockReply) -> Self {
        self.query_reply = reply;
        self
    }

    pub fn failing(self, error: EndpointError) -> Self {
        self.with_reply(MockReply::Fail(error))
    }

    pub fn hanging(self) -> Self {
        self.with_reply(MockReply::Hang)
    }

    pub fn with_metas(mut self, metas: Vec<ResultMeta>) -> Self {
        self.metas = metas;
        self
    }

    pub fn recorder(&self) -> MockRecorder {
        self.recorder.clone()
    }

    async fn play(&self, reply: &MockReply) -> Result<Vec<String>, EndpointError> {
        let guard = CallGuard::new(&self.recorder);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result: Result<Vec<String>, EndpointError> = match reply {
            MockReply::Ids(ids) => Ok(ids.clone()),
            MockReply::Fail(err) => Err(err.clone()),
            MockReply::Hang => std::future::pending().await,
        };
        guard.finish();
        result
    }
}

#[async_trait]
impl SearchEndpoint for MockEndpoint {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    async fn query(&self, terms: &[String]) -> Result<Vec<String>, EndpointError> {
        self.recorder.record(MockCall::Query(terms.to_vec()));
        self.play(&self.query_reply).await
    }

    async fn refine(
        &self,
        previous_ids: &[String],
        terms: &[String],
    ) -> Result<Vec<String>, EndpointError> {
        self.recorder.record(MockCall::Refine {
            previous: previous_ids.to_vec(),
            terms: terms.to_vec(),
        });
        let reply = self.refine_reply.as_ref().unwrap_or(&self.query_reply);
        self.play(reply).await
    }

    async fn fetch_metadata(&self, ids: &[String]) -> Result<Vec<ResultMeta>, EndpointError> {
        self.recorder.record(MockCall::Metas(ids.to_vec()));
        Ok(ids
            .iter()
            .map(|id| {
                self.metas
                    .iter()
                    .find(|m| m.id() == Some(id.as_str()))
                    .cloned()
                    .unwrap_or_else(|| ResultMeta::default().with("id", id.as_str()))
            })
            .collect())
    }

    async fn activate(
        &self,
        id: &str,
        terms: &[String],
        timestamp: u32,
    ) -> Result<(), EndpointError> {
        self.recorder.record(MockCall::Activate {
            id: id.to_string(),
            terms: terms.to_vec(),
            timestamp,
        });
        Ok(())
    }

    async fn launch(&self, terms: &[String], timestamp: u32) -> Result<(), EndpointError> {
        self.recorder.record(MockCall::Launch {
            terms: terms.to_vec(),
            timestamp,
        });
        Ok(())
    }
}
