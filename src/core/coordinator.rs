//! 单轮分发 / 汇聚（scatter / gather）
//!
//! 对一组提供者并发发出调用，按完成顺序产出结果，整轮共享一个截止时间。
//! 所有挂起中的调用都由 Round 持有（FuturesUnordered，不 spawn 任务）：
//! 截止时间到达、外部取消、调用方提前停止读取或直接丢弃 Round 时，
//! 挂起的调用 future 被同步丢弃，控制权返回时不会有调用在后台继续运行。

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{FusedStream, FuturesUnordered, Stream, StreamExt};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::core::{EndpointError, ProviderResponse, QueryOutcome};
use crate::provider::Endpoint;

type CallFuture = BoxFuture<'static, (Endpoint, Result<Vec<String>, EndpointError>)>;

/// 细化轮中对单个提供者的调用方式（分发前一次性决定）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// query(terms)
    ColdStart,
    /// refine(ids, terms)
    Refine(Vec<String>),
}

/// 路由规则：
/// 1. 在 forced 中 → 冷启动
/// 2. 上一轮成功且结果非空 → 细化
/// 3. 其余（无记录 / 失败 / 空结果）→ 冷启动
pub fn route(
    endpoint: &Endpoint,
    prior: &HashMap<Endpoint, QueryOutcome>,
    forced_coldstart: &HashSet<Endpoint>,
) -> Dispatch {
    if forced_coldstart.contains(endpoint) {
        return Dispatch::ColdStart;
    }
    match prior.get(endpoint).and_then(QueryOutcome::refinable_ids) {
        Some(ids) => Dispatch::Refine(ids.to_vec()),
        None => Dispatch::ColdStart,
    }
}

/// 无状态的分发引擎；可重入，可在多个会话间共享
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryCoordinator;

impl QueryCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// 对每个提供者发出冷启动调用
    ///
    /// 必须在 tokio 运行时中调用（截止时间计时器在此创建）。
    pub fn scatter<I>(&self, endpoints: I, terms: &[String], deadline: Duration) -> Round
    where
        I: IntoIterator<Item = Endpoint>,
    {
        let plan = endpoints
            .into_iter()
            .map(|endpoint| (endpoint, Dispatch::ColdStart))
            .collect();
        Round::dispatch(plan, terms, deadline)
    }

    /// 细化轮：分发集合为 prior 的键 ∪ forced_coldstart，逐个按 [`route`] 决定调用方式
    pub fn scatter_refine(
        &self,
        prior: &HashMap<Endpoint, QueryOutcome>,
        forced_coldstart: &HashSet<Endpoint>,
        terms: &[String],
        deadline: Duration,
    ) -> Round {
        let mut targets: Vec<&Endpoint> = prior.keys().chain(forced_coldstart.iter()).collect();
        targets.sort_by(|a, b| a.identity().cmp(b.identity()));
        targets.dedup();

        let plan: Vec<(Endpoint, Dispatch)> = targets
            .into_iter()
            .map(|endpoint| (endpoint.clone(), route(endpoint, prior, forced_coldstart)))
            .collect();

        let refines = plan
            .iter()
            .filter(|(_, d)| matches!(d, Dispatch::Refine(_)))
            .count();
        tracing::debug!(
            refine = refines,
            cold_start = plan.len() - refines,
            "Refine round routing decided"
        );

        Round::dispatch(plan, terms, deadline)
    }
}

/// 一轮结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEnd {
    /// 所有提供者都已返回
    Completed,
    /// 截止时间到达，剩余调用已取消
    DeadlineExpired,
    /// 外部取消（CancellationToken 或 Round::cancel）
    Cancelled,
}

/// 进行中的一轮：按完成顺序产出 [`ProviderResponse`] 的惰性流
///
/// 未返回的提供者保留在 [`Round::unfinished`] 中；它们不产生任何结果。
pub struct Round {
    terms: Arc<[String]>,
    calls: FuturesUnordered<CallFuture>,
    pending: HashSet<Endpoint>,
    deadline: Pin<Box<Sleep>>,
    cancel_signal: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    end: Option<RoundEnd>,
}

impl Round {
    fn dispatch(plan: Vec<(Endpoint, Dispatch)>, terms: &[String], deadline: Duration) -> Self {
        let terms: Arc<[String]> = Arc::from(terms);
        let calls = FuturesUnordered::new();
        let mut pending = HashSet::with_capacity(plan.len());

        for (endpoint, dispatch) in plan {
            if !pending.insert(endpoint.clone()) {
                continue;
            }
            let terms = Arc::clone(&terms);
            let call: CallFuture = match dispatch {
                Dispatch::ColdStart => Box::pin(async move {
                    let result = endpoint.query(&terms).await;
                    (endpoint, result)
                }),
                Dispatch::Refine(ids) => Box::pin(async move {
                    let result = endpoint.refine(&ids, &terms).await;
                    (endpoint, result)
                }),
            };
            calls.push(call);
        }

        tracing::debug!(providers = pending.len(), ?deadline, "Dispatching search round");

        Self {
            terms,
            calls,
            pending,
            deadline: Box::pin(tokio::time::sleep(deadline)),
            cancel_signal: None,
            end: None,
        }
    }

    /// 绑定外部取消信号：token 触发时本轮按取消结束
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_signal = Some(Box::pin(token.cancelled_owned()));
        self
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// 尚未产出结果的提供者；本轮结束后即为 unfinished 集合
    pub fn unfinished(&self) -> &HashSet<Endpoint> {
        &self.pending
    }

    /// 本轮是否已结束；结束原因
    pub fn end(&self) -> Option<RoundEnd> {
        self.end
    }

    /// 立即取消全部挂起调用，返回被取消的数量
    pub fn cancel(&mut self) -> usize {
        if self.end.is_some() {
            return 0;
        }
        self.abandon(RoundEnd::Cancelled)
    }

    /// 读完整轮：返回全部结果（完成顺序）与未完成的提供者
    pub async fn gather(mut self) -> (Vec<ProviderResponse>, HashSet<Endpoint>) {
        let mut responses = Vec::with_capacity(self.pending.len());
        while let Some(response) = self.next().await {
            responses.push(response);
        }
        (responses, std::mem::take(&mut self.pending))
    }

    fn abandon(&mut self, end: RoundEnd) -> usize {
        let outstanding = self.calls.len();
        // 丢弃即取消：每个挂起调用的 future 在此同步析构
        self.calls = FuturesUnordered::new();
        self.end = Some(end);
        if outstanding > 0 {
            tracing::info!(
                ?end,
                cancelled = outstanding,
                unfinished = self.pending.len(),
                "Search round ended with calls still pending"
            );
        }
        outstanding
    }
}

impl Stream for Round {
    type Item = ProviderResponse;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.end.is_some() {
            return Poll::Ready(None);
        }

        if let Some(signal) = this.cancel_signal.as_mut() {
            if signal.as_mut().poll(cx).is_ready() {
                this.abandon(RoundEnd::Cancelled);
                return Poll::Ready(None);
            }
        }

        // 消费方读得慢时，截止后才完成的调用不再产出
        if Instant::now() >= this.deadline.deadline() {
            this.abandon(RoundEnd::DeadlineExpired);
            return Poll::Ready(None);
        }

        match this.calls.poll_next_unpin(cx) {
            Poll::Ready(Some((endpoint, result))) => {
                this.pending.remove(&endpoint);
                if let Err(err) = &result {
                    tracing::warn!(provider = %endpoint.desktop_id(), error = %err, "Search provider failed");
                } else {
                    tracing::trace!(provider = %endpoint.desktop_id(), "Search provider answered");
                }
                return Poll::Ready(Some(ProviderResponse {
                    endpoint,
                    terms: Arc::clone(&this.terms),
                    outcome: result.into(),
                }));
            }
            Poll::Ready(None) => {
                this.end = Some(RoundEnd::Completed);
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }

        if this.deadline.as_mut().poll(cx).is_ready() {
            this.abandon(RoundEnd::DeadlineExpired);
            return Poll::Ready(None);
        }

        Poll::Pending
    }
}

impl FusedStream for Round {
    fn is_terminated(&self) -> bool {
        self.end.is_some()
    }
}

impl Drop for Round {
    fn drop(&mut self) {
        if self.end.is_none() && !self.calls.is_empty() {
            tracing::debug!(
                cancelled = self.calls.len(),
                "Search round dropped before completion"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockEndpoint, MockRecorder};

    fn terms(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    fn mock(name: &str, delay_ms: u64, ids: &[&str]) -> (Endpoint, MockRecorder) {
        let m = MockEndpoint::new(name)
            .with_delay(Duration::from_millis(delay_ms))
            .with_results(ids.iter().copied());
        let recorder = m.recorder();
        (Endpoint::new(m), recorder)
    }

    #[test]
    fn test_route_table() {
        let (a, _) = mock("a", 0, &[]);
        let (b, _) = mock("b", 0, &[]);
        let (c, _) = mock("c", 0, &[]);
        let (d, _) = mock("d", 0, &[]);
        let (e, _) = mock("e", 0, &[]);

        let mut prior = HashMap::new();
        prior.insert(a.clone(), QueryOutcome::Success(terms(&["a1", "a2"])));
        prior.insert(b.clone(), QueryOutcome::Success(vec![]));
        prior.insert(
            c.clone(),
            QueryOutcome::Failure(EndpointError::Transport("no such name".into())),
        );
        prior.insert(e.clone(), QueryOutcome::Success(terms(&["e1"])));
        let forced: HashSet<Endpoint> = [d.clone(), e.clone()].into_iter().collect();

        assert_eq!(route(&a, &prior, &forced), Dispatch::Refine(terms(&["a1", "a2"])));
        assert_eq!(route(&b, &prior, &forced), Dispatch::ColdStart);
        assert_eq!(route(&c, &prior, &forced), Dispatch::ColdStart);
        assert_eq!(route(&d, &prior, &forced), Dispatch::ColdStart);
        // forced 优先于可细化的上一轮结果
        assert_eq!(route(&e, &prior, &forced), Dispatch::ColdStart);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_in_completion_order() {
        let (slow, _) = mock("slow", 30, &["s"]);
        let (fast, _) = mock("fast", 10, &["f"]);
        let (mid, _) = mock("mid", 20, &["m"]);

        let round = QueryCoordinator::new().scatter(
            vec![slow, fast, mid],
            &terms(&["x"]),
            Duration::from_secs(1),
        );
        let (responses, unfinished) = round.gather().await;
        let order: Vec<_> = responses.iter().map(|r| r.endpoint.desktop_id().to_string()).collect();
        assert_eq!(order, ["fast.desktop", "mid.desktop", "slow.desktop"]);
        assert!(unfinished.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_abandons_stragglers() {
        let (a, _) = mock("a", 10, &["a1"]);
        let (b, _) = mock("b", 50, &["b1"]);
        let c_mock = MockEndpoint::new("c").hanging();
        let c_recorder = c_mock.recorder();
        let c = Endpoint::new(c_mock);

        let mut round = QueryCoordinator::new().scatter(
            vec![a.clone(), b.clone(), c.clone()],
            &terms(&["q"]),
            Duration::from_millis(100),
        );

        assert_eq!(round.next().await.map(|r| r.endpoint), Some(a));
        assert_eq!(round.next().await.map(|r| r.endpoint), Some(b));
        assert!(round.next().await.is_none());
        assert_eq!(round.end(), Some(RoundEnd::DeadlineExpired));
        assert_eq!(round.unfinished().len(), 1);
        assert!(round.unfinished().contains(&c));
        assert_eq!(c_recorder.cancelled(), 1);
        assert_eq!(c_recorder.in_flight(), 0);
        // 结束后保持结束
        assert!(round.next().await.is_none());
        assert!(round.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_consumer_gets_nothing_after_deadline() {
        let (a, a_recorder) = mock("a", 10, &["a1"]);
        let (c, c_recorder) = mock("c", 150, &["c1"]);

        let mut round = QueryCoordinator::new().scatter(
            vec![a.clone(), c.clone()],
            &terms(&["q"]),
            Duration::from_millis(100),
        );

        assert_eq!(round.next().await.map(|r| r.endpoint), Some(a));
        // 消费方忙到截止时间之后，c 在此期间本可完成
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(round.next().await.is_none());
        assert_eq!(round.end(), Some(RoundEnd::DeadlineExpired));
        assert_eq!(round.unfinished().len(), 1);
        assert!(round.unfinished().contains(&c));
        assert_eq!(a_recorder.completed(), 1);
        assert_eq!(c_recorder.completed(), 0);
        assert_eq!(c_recorder.cancelled(), 1);
        assert_eq!(c_recorder.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_delivered_inline() {
        let failing = MockEndpoint::new("broken")
            .with_delay(Duration::from_millis(5))
            .failing(EndpointError::Application {
                name: "org.freedesktop.DBus.Error.Failed".into(),
                message: "boom".into(),
            });
        let (ok, _) = mock("ok", 10, &["r"]);

        let round = QueryCoordinator::new().scatter(
            vec![Endpoint::new(failing), ok],
            &terms(&["q"]),
            Duration::from_secs(1),
        );
        let (responses, unfinished) = round.gather().await;
        assert_eq!(responses.len(), 2);
        assert!(!responses[0].succeeded());
        assert_eq!(responses[0].outcome.error().map(EndpointError::kind), Some("ApplicationError"));
        assert!(responses[1].succeeded());
        assert!(unfinished.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_exit_cancels_remaining_calls() {
        let mut recorders = Vec::new();
        let mut endpoints = Vec::new();
        for (i, delay) in [10u64, 20, 30, 40, 50].into_iter().enumerate() {
            let (endpoint, recorder) = mock(&format!("p{i}"), delay, &["r"]);
            endpoints.push(endpoint);
            recorders.push(recorder);
        }

        let mut round = QueryCoordinator::new().scatter(endpoints, &terms(&["q"]), Duration::from_secs(5));
        let mut seen = 0;
        while let Some(_response) = round.next().await {
            seen += 1;
            if seen == 2 {
                break;
            }
        }
        drop(round);

        let completed: usize = recorders.iter().map(MockRecorder::completed).sum();
        let cancelled: usize = recorders.iter().map(MockRecorder::cancelled).sum();
        assert_eq!(completed, 2);
        assert_eq!(cancelled, 3);
        assert!(recorders.iter().all(|p| p.in_flight() == 0));
    }

    async fn consume_until_error(mut round: Round) -> Result<usize, String> {
        let mut seen = 0;
        while let Some(response) = round.next().await {
            seen += 1;
            if response.endpoint.desktop_id() == "p0.desktop" {
                return Err("consumer failed".into());
            }
        }
        Ok(seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumer_error_cancels_remaining_calls() {
        let (p0, recorder0) = mock("p0", 10, &["r"]);
        let (p1, recorder1) = mock("p1", 100, &["r"]);
        let round = QueryCoordinator::new().scatter(vec![p0, p1], &terms(&["q"]), Duration::from_secs(5));

        assert!(consume_until_error(round).await.is_err());
        assert_eq!(recorder0.completed(), 1);
        assert_eq!(recorder1.cancelled(), 1);
        assert_eq!(recorder1.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_consumer_future_cancels_calls() {
        let (p0, recorder0) = mock("p0", 1_000, &["r"]);
        let round = QueryCoordinator::new().scatter(vec![p0], &terms(&["q"]), Duration::from_secs(5));

        let outcome = tokio::time::timeout(Duration::from_millis(10), round.gather()).await;
        assert!(outcome.is_err());
        assert_eq!(recorder0.cancelled(), 1);
        assert_eq!(recorder0.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancellation() {
        let (p0, _) = mock("p0", 10, &["r"]);
        let hang = MockEndpoint::new("hang").hanging();
        let hang_recorder = hang.recorder();
        let token = CancellationToken::new();

        let mut round = QueryCoordinator::new()
            .scatter(vec![p0, Endpoint::new(hang)], &terms(&["q"]), Duration::from_secs(5))
            .with_cancellation(token.clone());

        assert!(round.next().await.is_some());
        token.cancel();
        assert!(round.next().await.is_none());
        assert_eq!(round.end(), Some(RoundEnd::Cancelled));
        assert_eq!(hang_recorder.cancelled(), 1);
        assert_eq!(round.unfinished().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_cancel_reports_count() {
        let (p0, recorder) = mock("p0", 100, &["r"]);
        let mut round = QueryCoordinator::new().scatter(vec![p0], &terms(&["q"]), Duration::from_secs(5));
        // 先轮询一次，让调用真正开始
        assert!(tokio::time::timeout(Duration::from_millis(1), round.next()).await.is_err());
        assert_eq!(round.cancel(), 1);
        assert_eq!(round.cancel(), 0);
        assert_eq!(recorder.cancelled(), 1);
        assert!(round.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_round_completes_immediately() {
        let mut round = QueryCoordinator::new().scatter(Vec::new(), &terms(&["q"]), Duration::from_secs(5));
        assert!(round.next().await.is_none());
        assert_eq!(round.end(), Some(RoundEnd::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scatter_refine_dispatch() {
        let (a, pa) = mock("a", 1, &["a2"]);
        let (b, pb) = mock("b", 1, &["b1"]);
        let (c, pc) = mock("c", 1, &["c1"]);

        let mut prior = HashMap::new();
        prior.insert(a.clone(), QueryOutcome::Success(terms(&["a1"])));
        prior.insert(b.clone(), QueryOutcome::Success(vec![]));
        let forced: HashSet<Endpoint> = [c.clone()].into_iter().collect();

        let round = QueryCoordinator::new().scatter_refine(&prior, &forced, &terms(&["q2"]), Duration::from_secs(1));
        let (responses, unfinished) = round.gather().await;
        assert_eq!(responses.len(), 3);
        assert!(unfinished.is_empty());

        assert_eq!(
            pa.calls(),
            vec![crate::provider::MockCall::Refine {
                previous: terms(&["a1"]),
                terms: terms(&["q2"]),
            }]
        );
        assert_eq!(pb.calls(), vec![crate::provider::MockCall::Query(terms(&["q2"]))]);
        assert_eq!(pc.calls(), vec![crate::provider::MockCall::Query(terms(&["q2"]))]);
    }
}
