use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use candle_sync_core::{CallClass, Candle, FetchPage, SyncError, UpstreamFetcher};

use crate::candle;

/// Instruction for how a fetch should behave for a given cursor.
#[derive(Clone, Debug)]
pub enum MockBehavior<T> {
    /// Return the provided value immediately.
    Return(T),
    /// Return the provided value after a delay.
    ReturnAfter(Duration, T),
    /// Fail immediately with the provided error.
    Fail(SyncError),
    /// Hang indefinitely (simulate a stalled upstream).
    Hang,
}

/// Deterministic upstream history generated on demand.
///
/// Candles exist on every grid point in `[first, last]` except `holes`; each
/// page holds at most `page_size` rows and carries the last row time as its
/// continuation marker, like Kraken's `last`.
#[derive(Clone, Debug)]
pub struct SyntheticHistory {
    /// First open time available upstream.
    pub first: i64,
    /// Last open time available upstream (inclusive).
    pub last: i64,
    /// Maximum rows per page.
    pub page_size: usize,
    /// Open times the upstream never delivers.
    pub holes: BTreeSet<i64>,
}

impl SyntheticHistory {
    /// Gapless history over `[first, last]`.
    #[must_use]
    pub const fn new(first: i64, last: i64, page_size: usize) -> Self {
        Self {
            first,
            last,
            page_size,
            holes: BTreeSet::new(),
        }
    }

    /// Remove `times` from the upstream history.
    #[must_use]
    pub fn with_holes(mut self, times: impl IntoIterator<Item = i64>) -> Self {
        self.holes.extend(times);
        self
    }

    /// The page served for `since`.
    #[must_use]
    pub fn page(&self, pair: &str, timeframe_minutes: u32, since: i64) -> FetchPage {
        let step = i64::from(timeframe_minutes) * 60;
        let from = since.max(self.first);
        let rem = from.rem_euclid(step);
        let mut t = if rem == 0 { from } else { from + (step - rem) };
        let mut rows = Vec::new();
        while t <= self.last && rows.len() < self.page_size {
            if !self.holes.contains(&t) {
                rows.push(candle(pair, timeframe_minutes, t));
            }
            t += step;
        }
        let continuation = rows.last().map(|c: &Candle| c.time);
        FetchPage::new(rows, continuation)
    }
}

/// One recorded call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchCall {
    /// Requested pair.
    pub pair: String,
    /// Requested timeframe.
    pub timeframe_minutes: u32,
    /// Requested cursor.
    pub since: i64,
}

#[derive(Default)]
struct InternalState {
    scripted: HashMap<i64, VecDeque<MockBehavior<FetchPage>>>,
    fallback: Option<MockBehavior<FetchPage>>,
    synthetic: Option<SyntheticHistory>,
    latency: Option<Duration>,
    calls: Vec<FetchCall>,
}

impl InternalState {
    /// Scripted queues are consumed front to back; the last entry sticks.
    fn next_behavior(&mut self, since: i64) -> Option<MockBehavior<FetchPage>> {
        if let Some(queue) = self.scripted.get_mut(&since)
            && let Some(front) = queue.front().cloned()
        {
            if queue.len() > 1 {
                queue.pop_front();
            }
            return Some(front);
        }
        self.fallback.clone()
    }
}

/// Controller handle used by tests to drive a [`ScriptedFetcher`] from the outside.
#[derive(Clone)]
pub struct FetcherController {
    state: Arc<Mutex<InternalState>>,
}

impl FetcherController {
    /// Script the behaviors served, in order, for cursor `since`.
    pub async fn script(&self, since: i64, behaviors: Vec<MockBehavior<FetchPage>>) {
        let mut guard = self.state.lock().await;
        guard.scripted.insert(since, behaviors.into());
    }

    /// Behavior for cursors without a script; overrides the synthetic history.
    pub async fn set_fallback(&self, behavior: MockBehavior<FetchPage>) {
        let mut guard = self.state.lock().await;
        guard.fallback = Some(behavior);
    }

    /// Serve unscripted cursors from a generated history.
    pub async fn set_synthetic(&self, history: SyntheticHistory) {
        let mut guard = self.state.lock().await;
        guard.synthetic = Some(history);
    }

    /// Delay every fetch by `latency` before its behavior applies.
    pub async fn set_latency(&self, latency: Duration) {
        let mut guard = self.state.lock().await;
        guard.latency = Some(latency);
    }

    /// Cursors requested so far, in call order.
    pub async fn calls(&self) -> Vec<FetchCall> {
        self.state.lock().await.calls.clone()
    }

    /// Requested cursors only.
    pub async fn cursors(&self) -> Vec<i64> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .map(|c| c.since)
            .collect()
    }

    /// Clear scripts, fallback, synthetic history and the call log.
    pub async fn clear_all_behaviors(&self) {
        let mut guard = self.state.lock().await;
        *guard = InternalState::default();
    }
}

/// Upstream fetcher whose responses are scripted per cursor.
pub struct ScriptedFetcher {
    name: &'static str,
    page_limit: Option<usize>,
    call_class: CallClass,
    state: Arc<Mutex<InternalState>>,
}

/// Builder for [`ScriptedFetcher`].
pub struct ScriptedFetcherBuilder {
    name: &'static str,
    page_limit: Option<usize>,
    call_class: CallClass,
}

impl ScriptedFetcherBuilder {
    /// Advertise a page limit, enabling short-page detection.
    #[must_use]
    pub const fn page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Charge calls to `class`.
    #[must_use]
    pub const fn call_class(mut self, class: CallClass) -> Self {
        self.call_class = class;
        self
    }

    /// Build the fetcher and its controller.
    #[must_use]
    pub fn build(self) -> (Arc<ScriptedFetcher>, FetcherController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let fetcher = Arc::new(ScriptedFetcher {
            name: self.name,
            page_limit: self.page_limit,
            call_class: self.call_class,
            state: Arc::clone(&state),
        });
        (fetcher, FetcherController { state })
    }
}

impl ScriptedFetcher {
    /// Start building a fetcher named `name`.
    #[must_use]
    pub const fn builder(name: &'static str) -> ScriptedFetcherBuilder {
        ScriptedFetcherBuilder {
            name,
            page_limit: None,
            call_class: CallClass::Public,
        }
    }

    /// Fetcher with defaults and its controller.
    #[must_use]
    pub fn new_with_controller(name: &'static str) -> (Arc<Self>, FetcherController) {
        Self::builder(name).build()
    }
}

#[async_trait]
impl UpstreamFetcher for ScriptedFetcher {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(
        &self,
        pair: &str,
        timeframe_minutes: u32,
        since: i64,
    ) -> Result<FetchPage, SyncError> {
        // Resolve under the lock, act after releasing it.
        let (behavior, latency) = {
            let mut guard = self.state.lock().await;
            guard.calls.push(FetchCall {
                pair: pair.to_string(),
                timeframe_minutes,
                since,
            });
            let behavior = match guard.next_behavior(since) {
                Some(b) => b,
                None => MockBehavior::Return(
                    guard
                        .synthetic
                        .as_ref()
                        .map(|h| h.page(pair, timeframe_minutes, since))
                        .unwrap_or_default(),
                ),
            };
            (behavior, guard.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match behavior {
            MockBehavior::Return(page) => Ok(page),
            MockBehavior::ReturnAfter(delay, page) => {
                tokio::time::sleep(delay).await;
                Ok(page)
            }
            MockBehavior::Fail(e) => Err(e),
            MockBehavior::Hang => std::future::pending().await,
        }
    }

    fn page_limit(&self) -> Option<usize> {
        self.page_limit
    }

    fn call_class(&self) -> CallClass {
        self.call_class
    }
}
