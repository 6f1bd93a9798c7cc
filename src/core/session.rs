//! 跨轮会话状态
//!
//! 只保存决定下一轮路由所需的最少信息：上一轮的结果（细化输入）与上一轮未返回的提供者
//! （下一轮强制冷启动）。两种操作无限循环：
//! - initial：全体标记为未完成、清空结果，对全体冷启动；
//! - refine：先取走上一轮的结果与未完成集合作为本轮输入，立即重置为「全体未完成」，
//!   再分发；本轮结果边到达边记录，留作下一轮的输入。
//!
//! 进行中的一轮以可变借用持有 RoundRecord，轮次进行时无法从外部修改会话或注册表。

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{FusedStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::coordinator::{QueryCoordinator, Round, RoundEnd};
use super::outcome::{ProviderResponse, QueryOutcome};
use crate::provider::{Endpoint, Registry};

/// 最近一轮的记录：每个提供者要么有结果，要么在 unfinished 中
#[derive(Debug, Default, Clone)]
pub struct RoundRecord {
    outcomes: HashMap<Endpoint, QueryOutcome>,
    unfinished: HashSet<Endpoint>,
}

impl RoundRecord {
    pub fn outcomes(&self) -> &HashMap<Endpoint, QueryOutcome> {
        &self.outcomes
    }

    pub fn unfinished(&self) -> &HashSet<Endpoint> {
        &self.unfinished
    }

    fn reset(&mut self, population: &[Endpoint]) {
        self.outcomes.clear();
        self.unfinished.clear();
        self.unfinished.extend(population.iter().cloned());
    }

    fn record(&mut self, response: &ProviderResponse) {
        self.unfinished.remove(&response.endpoint);
        self.outcomes
            .insert(response.endpoint.clone(), response.outcome.clone());
    }
}

/// 有状态的搜索会话
#[derive(Debug)]
pub struct SearchSession {
    coordinator: QueryCoordinator,
    registry: Registry,
    record: RoundRecord,
    deadline: Duration,
    cancel: Option<CancellationToken>,
}

impl SearchSession {
    pub fn new(registry: Registry, deadline: Duration) -> Self {
        Self {
            coordinator: QueryCoordinator::new(),
            registry,
            record: RoundRecord::default(),
            deadline,
            cancel: None,
        }
    }

    /// 每轮都绑定该取消信号（如进程关闭 token）
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 在两轮之间增删提供者
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: Duration) {
        self.deadline = deadline;
    }

    pub fn record(&self) -> &RoundRecord {
        &self.record
    }

    pub fn outcomes(&self) -> &HashMap<Endpoint, QueryOutcome> {
        self.record.outcomes()
    }

    pub fn unfinished(&self) -> &HashSet<Endpoint> {
        self.record.unfinished()
    }

    /// 新一轮冷启动搜索
    pub fn initial(&mut self, terms: &[String]) -> SessionRound<'_> {
        let population = self.registry.endpoints();
        self.record.reset(&population);
        tracing::debug!(providers = population.len(), ?terms, "Starting initial search round");

        let round = self.coordinator.scatter(population, terms, self.deadline);
        self.attach(round)
    }

    /// 在上一轮基础上细化
    pub fn refine(&mut self, terms: &[String]) -> SessionRound<'_> {
        let population = self.registry.endpoints();
        let current: HashSet<&Endpoint> = population.iter().collect();

        let previous = std::mem::take(&mut self.record);
        let RoundRecord {
            outcomes: mut prior,
            unfinished: mut forced,
        } = previous;
        prior.retain(|endpoint, _| current.contains(endpoint));
        forced.retain(|endpoint| current.contains(endpoint));
        // 上一轮之后新加入的提供者没有任何记录，按冷启动处理
        for endpoint in &population {
            if !prior.contains_key(endpoint) && !forced.contains(endpoint) {
                forced.insert(endpoint.clone());
            }
        }

        self.record.reset(&population);
        tracing::debug!(
            providers = population.len(),
            forced_cold_start = forced.len(),
            ?terms,
            "Starting refine search round"
        );

        let round = self
            .coordinator
            .scatter_refine(&prior, &forced, terms, self.deadline);
        self.attach(round)
    }

    fn attach(&mut self, round: Round) -> SessionRound<'_> {
        let round = match &self.cancel {
            Some(token) => round.with_cancellation(token.clone()),
            None => round,
        };
        SessionRound {
            round,
            record: &mut self.record,
        }
    }
}

/// 会话中的一轮：转发 Round 的结果，并逐个记入会话状态
pub struct SessionRound<'a> {
    round: Round,
    record: &'a mut RoundRecord,
}

impl SessionRound<'_> {
    pub fn terms(&self) -> &[String] {
        self.round.terms()
    }

    /// 截至目前尚未返回的提供者
    pub fn unfinished(&self) -> &HashSet<Endpoint> {
        self.record.unfinished()
    }

    pub fn end(&self) -> Option<RoundEnd> {
        self.round.end()
    }

    pub fn cancel(&mut self) -> usize {
        self.round.cancel()
    }

    /// 读完整轮，返回全部结果（完成顺序）
    pub async fn gather(mut self) -> Vec<ProviderResponse> {
        let mut responses = Vec::new();
        while let Some(response) = self.next().await {
            responses.push(response);
        }
        responses
    }
}

impl Stream for SessionRound<'_> {
    type Item = ProviderResponse;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.round.poll_next_unpin(cx) {
            Poll::Ready(Some(response)) => {
                this.record.record(&response);
                Poll::Ready(Some(response))
            }
            other => other,
        }
    }
}

impl FusedStream for SessionRound<'_> {
    fn is_terminated(&self) -> bool {
        self.round.is_terminated()
    }
}
