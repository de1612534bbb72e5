//! Catalog request gateway.
//!
//! Every outbound catalog call goes through [`Gateway::fetch`], which:
//! - serves fresh cache entries without touching the network,
//! - queues misses and runs them strictly one at a time,
//! - waits the current delay after every request, throttled or not,
//! - retries 429 answers from the front of the queue, doubling the delay.
//!
//! The delay starts at the configured minimum interval and only ever grows.
//! Concurrent misses for the same key are not merged; each one performs its
//! own request and the last write wins.

use crate::api::{Params, Transport};
use crate::clock::{Clock, SystemClock};
use crate::error::{GatewayError, GatewayResult};
use crate::store::{CacheEntry, CacheStats, CacheStore};
use serde_json::Value;
use shared::CatalogConfig;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Pacing and cache ownership settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Initial wait between two consecutive requests
    pub min_interval: Duration,
    /// Ceiling for the wait after repeated throttling
    pub max_delay: Duration,
    /// Total attempts per request while the catalog answers 429
    pub max_attempts: u32,
    /// Prefix of every cache key the gateway owns
    pub key_prefix: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            max_attempts: 3,
            key_prefix: "jikan_".to_string(),
        }
    }
}

impl GatewaySettings {
    /// Settings from the `[catalog]` section.
    ///
    /// The ceiling is raised to the minimum interval when configured below it.
    pub fn from_config(config: &CatalogConfig) -> Self {
        let min_interval = Duration::from_millis(config.rate_limit.min_interval_ms);
        Self {
            min_interval,
            max_delay: Duration::from_millis(config.rate_limit.max_delay_ms).max(min_interval),
            max_attempts: config.rate_limit.max_attempts.max(1),
            key_prefix: config.cache.key_prefix.clone(),
        }
    }
}

/// A cache miss waiting for its turn
struct QueuedRequest {
    endpoint: String,
    cache_key: String,
    params: Params,
    responder: oneshot::Sender<GatewayResult<Value>>,
    attempts_left: u32,
}

struct GatewayState {
    queue: VecDeque<QueuedRequest>,
    /// True while a processor task owns the queue
    processing: bool,
    current_delay: Duration,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    settings: GatewaySettings,
    state: Mutex<GatewayState>,
}

/// Shared handle to one gateway instance (one per base URL).
///
/// Cloning is cheap; all clones share the queue, the delay and the store.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

impl Gateway {
    /// Create a gateway on the system clock
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CacheStore>,
        settings: GatewaySettings,
    ) -> Self {
        Self::with_clock(transport, store, Arc::new(SystemClock), settings)
    }

    /// Create a gateway with an explicit clock for cache timestamps
    pub fn with_clock(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        settings: GatewaySettings,
    ) -> Self {
        let state = GatewayState {
            queue: VecDeque::new(),
            processing: false,
            current_delay: settings.min_interval,
        };

        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                clock,
                settings,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.inner.settings
    }

    /// Fetch the `data` payload for `endpoint`, from cache when fresh.
    ///
    /// A non-positive `ttl_minutes` skips the cache lookup; the response is
    /// still written back under `cache_key`.
    pub async fn fetch(
        &self,
        endpoint: &str,
        cache_key: &str,
        ttl_minutes: i64,
        params: Params,
    ) -> GatewayResult<Value> {
        if ttl_minutes > 0 {
            if let Some(data) = self.inner.cached(cache_key, ttl_minutes) {
                return Ok(data);
            }
        }

        let (responder, receiver) = oneshot::channel();
        let request = QueuedRequest {
            endpoint: endpoint.to_string(),
            cache_key: cache_key.to_string(),
            params,
            responder,
            attempts_left: self.inner.settings.max_attempts.max(1),
        };

        let start_processor = {
            let mut state = self.inner.state.lock().await;
            state.queue.push_back(request);
            debug!(
                cache_key = cache_key,
                queued = state.queue.len(),
                "Request queued"
            );
            !std::mem::replace(&mut state.processing, true)
        };

        if start_processor {
            tokio::spawn(Arc::clone(&self.inner).process_queue());
        }

        receiver.await.map_err(|_| GatewayError::Closed)?
    }

    /// Remove every cache entry carrying the reserved prefix
    pub fn clear_cache(&self) -> GatewayResult<usize> {
        let prefix = self.inner.settings.key_prefix.as_str();
        let removed = self
            .inner
            .store
            .remove_if(&|key| key.starts_with(prefix))
            .map_err(GatewayError::store)?;

        info!(removed = removed, prefix = prefix, "Cache cleared");
        Ok(removed)
    }

    /// Count and size of the entries carrying the reserved prefix
    pub fn cache_stats(&self) -> GatewayResult<CacheStats> {
        let prefix = self.inner.settings.key_prefix.as_str();
        let entries = self.inner.store.entries().map_err(GatewayError::store)?;

        Ok(entries
            .into_iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .fold(CacheStats::default(), |mut stats, (_, size)| {
                stats.total_entries += 1;
                stats.total_size_bytes += size as u64;
                stats
            }))
    }

    /// Wait currently applied between two requests
    pub async fn current_delay(&self) -> Duration {
        self.inner.state.lock().await.current_delay
    }

    /// Number of requests waiting in the queue
    pub async fn pending(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }
}

impl Inner {
    /// Fresh cached payload for `key`, if any. Unreadable entries count as misses.
    fn cached(&self, key: &str, ttl_minutes: i64) -> Option<Value> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(cache_key = key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(cache_key = key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let entry = match CacheEntry::decode(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(cache_key = key, error = %e, "Corrupt cache entry, treating as miss");
                return None;
            }
        };

        if entry.is_fresh(self.clock.now_millis(), ttl_minutes) {
            debug!(cache_key = key, "Cache hit");
            Some(entry.data)
        } else {
            debug!(cache_key = key, stored_at = entry.timestamp, "Cache entry expired");
            None
        }
    }

    /// Drain the queue one request at a time, then mark the gateway idle
    async fn process_queue(self: Arc<Self>) {
        loop {
            let request = {
                let mut state = self.state.lock().await;
                match state.queue.pop_front() {
                    Some(request) => request,
                    None => {
                        state.processing = false;
                        debug!("Request queue drained");
                        return;
                    }
                }
            };

            // Run on its own task so a panicking transport only fails its caller
            let inner = Arc::clone(&self);
            if let Err(e) = tokio::spawn(async move { inner.execute(request).await }).await {
                error!(error = %e, "Catalog request task aborted");
            }

            let delay = self.state.lock().await.current_delay;
            sleep(delay).await;
        }
    }

    async fn execute(&self, mut request: QueuedRequest) {
        debug!(
            endpoint = %request.endpoint,
            cache_key = %request.cache_key,
            attempts_left = request.attempts_left,
            "Dispatching catalog request"
        );

        let outcome = self
            .transport
            .get(&request.endpoint, &request.params)
            .await
            .and_then(unwrap_envelope);

        match outcome {
            Ok(data) => {
                self.store_response(&request.cache_key, &data);
                respond(request.responder, Ok(data));
            }
            Err(err) if err.is_throttled() => {
                request.attempts_left -= 1;

                if request.attempts_left == 0 {
                    warn!(
                        endpoint = %request.endpoint,
                        attempts = self.settings.max_attempts,
                        "Throttled on every attempt, giving up"
                    );
                    respond(
                        request.responder,
                        Err(GatewayError::Throttled {
                            attempts: self.settings.max_attempts,
                        }),
                    );
                    return;
                }

                let mut state = self.state.lock().await;
                state.current_delay = escalate(state.current_delay, self.settings.max_delay);
                warn!(
                    endpoint = %request.endpoint,
                    attempts_left = request.attempts_left,
                    delay_ms = state.current_delay.as_millis() as u64,
                    "Rate limited by catalog, requeueing at front"
                );
                state.queue.push_front(request);
            }
            Err(err) => {
                warn!(endpoint = %request.endpoint, error = %err, "Catalog request failed");
                respond(request.responder, Err(err));
            }
        }
    }

    fn store_response(&self, key: &str, data: &Value) {
        let entry = CacheEntry::new(data.clone(), self.clock.now_millis());
        let written = entry.encode().and_then(|raw| self.store.set(key, &raw));

        match written {
            Ok(()) => debug!(cache_key = key, "Cache stored"),
            Err(e) => warn!(cache_key = key, error = %e, "Failed to store response in cache"),
        }
    }
}

/// Doubled delay, capped at `max_delay` but never below `current`
fn escalate(current: Duration, max_delay: Duration) -> Duration {
    current.saturating_mul(2).min(max_delay).max(current)
}

/// Take the `data` member out of the catalog's response envelope
fn unwrap_envelope(mut body: Value) -> GatewayResult<Value> {
    match body.get_mut("data") {
        Some(data) => Ok(data.take()),
        None => Err(GatewayError::Decode(
            "response has no `data` envelope".to_string(),
        )),
    }
}

fn respond(responder: oneshot::Sender<GatewayResult<Value>>, result: GatewayResult<Value>) {
    if responder.send(result).is_err() {
        debug!("Caller stopped waiting before the request completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{ManualClock, Reply, ScriptedTransport};
    use serde_json::json;

    const T0: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60_000;

    struct Harness {
        gateway: Gateway,
        transport: Arc<ScriptedTransport>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn harness(transport: ScriptedTransport) -> Harness {
        harness_with(transport, GatewaySettings::default())
    }

    fn harness_with(transport: ScriptedTransport, settings: GatewaySettings) -> Harness {
        let transport = Arc::new(transport);
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let gateway = Gateway::with_clock(
            transport.clone(),
            store.clone(),
            clock.clone(),
            settings,
        );
        Harness {
            gateway,
            transport,
            store,
            clock,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_avoids_network() {
        let h = harness(ScriptedTransport::new());
        let entry = CacheEntry::new(json!(["cached"]), T0);
        h.store.set("jikan_top", &entry.encode().unwrap()).unwrap();

        h.clock.set(T0 + 30 * MINUTE - 1);
        let data = h.gateway.fetch("/top/anime", "jikan_top", 30, Vec::new()).await.unwrap();
        assert_eq!(data, json!(["cached"]));
        assert_eq!(h.transport.call_count(), 0);

        h.clock.set(T0 + 30 * MINUTE + 1);
        h.gateway.fetch("/top/anime", "jikan_top", 30, Vec::new()).await.unwrap();
        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_top_anime_scenario() {
        let items: Vec<Value> = (1..=10).map(|id| json!({"mal_id": id})).collect();
        let transport = ScriptedTransport::new();
        transport.push(Reply::Body(json!({"data": items.clone(), "pagination": {}})));
        transport.push(Reply::Body(json!({"data": items.clone()})));
        let h = harness(transport);

        let first = h
            .gateway
            .fetch("/top/anime", "topAnimes", 30, params(&[("limit", "10")]))
            .await
            .unwrap();
        assert_eq!(first, Value::Array(items.clone()));
        assert_eq!(h.transport.call_count(), 1);
        assert_eq!(h.transport.calls()[0].params, params(&[("limit", "10")]));

        h.clock.advance(5 * MINUTE);
        let second = h
            .gateway
            .fetch("/top/anime", "topAnimes", 30, params(&[("limit", "10")]))
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(h.transport.call_count(), 1);

        h.clock.advance(26 * MINUTE);
        h.gateway
            .fetch("/top/anime", "topAnimes", 30, params(&[("limit", "10")]))
            .await
            .unwrap();
        assert_eq!(h.transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_are_serialized() {
        let h = harness(ScriptedTransport::new().with_latency(Duration::from_millis(50)));

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let gateway = h.gateway.clone();
                tokio::spawn(async move {
                    let endpoint = format!("/anime/{}", i);
                    let key = format!("jikan_anime_{}", i);
                    gateway.fetch(&endpoint, &key, 30, Vec::new()).await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(h.transport.call_count(), 5);
        assert_eq!(h.transport.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconditional_delay_between_requests() {
        let h = harness(ScriptedTransport::new());

        let a = h.gateway.clone();
        let b = h.gateway.clone();
        let (ra, rb) = tokio::join!(
            a.fetch("/anime/1", "jikan_anime_1", 30, Vec::new()),
            b.fetch("/anime/2", "jikan_anime_2", 30, Vec::new()),
        );
        assert!(ra.is_ok() && rb.is_ok());

        let calls = h.transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].at - calls[0].at, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_escalation() {
        let transport = ScriptedTransport::new();
        transport.push(Reply::Status(429));
        transport.push(Reply::Status(429));
        transport.push(Reply::Body(json!({"data": {"mal_id": 1}})));
        let h = harness(transport);

        let data = h.gateway.fetch("/anime/1", "jikan_anime_1", 30, Vec::new()).await.unwrap();
        assert_eq!(data, json!({"mal_id": 1}));

        let calls = h.transport.calls();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1].at - calls[0].at;
        let second_gap = calls[2].at - calls[1].at;
        assert_eq!(first_gap, Duration::from_secs(2));
        assert_eq!(second_gap, first_gap * 2);
        assert_eq!(h.gateway.current_delay().await, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push(Reply::Status(429));
        }
        transport.push(Reply::Body(json!({"data": "next"})));
        let h = harness(transport);

        let err = h
            .gateway
            .fetch("/anime/1", "jikan_anime_1", 30, Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Throttled { attempts: 3 });
        assert_eq!(h.transport.call_count(), 3);
        assert_eq!(h.gateway.pending().await, 0);
        assert!(h.store.get("jikan_anime_1").unwrap().is_none());

        // The next scripted reply belongs to a different request
        let data = h.gateway.fetch("/anime/2", "jikan_anime_2", 30, Vec::new()).await.unwrap();
        assert_eq!(data, json!("next"));
        assert_eq!(h.transport.calls()[3].endpoint, "/anime/2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_request_keeps_priority() {
        let transport = ScriptedTransport::new().with_latency(Duration::from_millis(50));
        transport.push(Reply::Status(429));
        let h = harness(transport);

        let first = {
            let gateway = h.gateway.clone();
            tokio::spawn(async move {
                gateway.fetch("/anime/1", "jikan_anime_1", 30, Vec::new()).await
            })
        };
        let second = {
            let gateway = h.gateway.clone();
            tokio::spawn(async move {
                gateway.fetch("/anime/2", "jikan_anime_2", 30, Vec::new()).await
            })
        };

        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());

        let endpoints: Vec<String> = h.transport.calls().into_iter().map(|c| c.endpoint).collect();
        assert_eq!(endpoints, vec!["/anime/1", "/anime/1", "/anime/2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_capped_and_never_reset() {
        let transport = ScriptedTransport::new();
        for _ in 0..6 {
            transport.push(Reply::Status(429));
        }
        let settings = GatewaySettings {
            max_attempts: 10,
            ..GatewaySettings::default()
        };
        let h = harness_with(transport, settings);

        h.gateway.fetch("/anime/1", "jikan_anime_1", 30, Vec::new()).await.unwrap();
        assert_eq!(h.gateway.current_delay().await, Duration::from_secs(10));

        // Successes afterwards keep the escalated pace
        h.gateway.fetch("/anime/2", "jikan_anime_2", 30, Vec::new()).await.unwrap();
        assert_eq!(h.gateway.current_delay().await, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_reject_without_retry() {
        let transport = ScriptedTransport::new();
        transport.push(Reply::Status(500));
        let h = harness(transport);

        let err = h
            .gateway
            .fetch("/anime/1", "jikan_anime_1", 30, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Status { status: 500, .. }));
        assert_eq!(h.transport.call_count(), 1);
        assert_eq!(h.gateway.current_delay().await, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_envelope_is_decode_error() {
        let transport = ScriptedTransport::new();
        transport.push(Reply::Body(json!({"status": "ok"})));
        let h = harness(transport);

        let err = h
            .gateway
            .fetch("/anime/1", "jikan_anime_1", 30, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
        assert!(h.store.get("jikan_anime_1").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_write_overwrites_previous_entry() {
        let transport = ScriptedTransport::new();
        transport.push(Reply::Body(json!({"data": "v1"})));
        transport.push(Reply::Body(json!({"data": "v2"})));
        let h = harness(transport);

        assert_eq!(h.gateway.fetch("/anime", "jikan_k", 30, Vec::new()).await.unwrap(), json!("v1"));
        // Zero TTL bypasses the lookup but still refreshes the slot
        assert_eq!(h.gateway.fetch("/anime", "jikan_k", 0, Vec::new()).await.unwrap(), json!("v2"));
        assert_eq!(h.gateway.fetch("/anime", "jikan_k", 30, Vec::new()).await.unwrap(), json!("v2"));
        assert_eq!(h.transport.call_count(), 2);

        let stored = CacheEntry::decode(&h.store.get("jikan_k").unwrap().unwrap()).unwrap();
        assert_eq!(stored, CacheEntry::new(json!("v2"), T0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_ttl_always_hits_network() {
        let h = harness(ScriptedTransport::new());

        h.gateway.fetch("/anime", "jikan_k", -1, Vec::new()).await.unwrap();
        h.gateway.fetch("/anime", "jikan_k", -1, Vec::new()).await.unwrap();
        assert_eq!(h.transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_entry_is_a_miss() {
        let h = harness(ScriptedTransport::new());
        h.store.set("jikan_k", r#"{"data": [1, 2"#).unwrap();

        let data = h.gateway.fetch("/anime", "jikan_k", 30, Vec::new()).await.unwrap();
        assert_eq!(data, json!("/anime"));
        assert_eq!(h.transport.call_count(), 1);
        assert!(CacheEntry::decode(&h.store.get("jikan_k").unwrap().unwrap()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_timestamp_is_a_miss() {
        let h = harness(ScriptedTransport::new());
        h.store
            .set("jikan_k", r#"{"data":1,"timestamp":-9223372036854775808}"#)
            .unwrap();

        let data = h.gateway.fetch("/anime", "jikan_k", 30, Vec::new()).await.unwrap();
        assert_eq!(data, json!("/anime"));
        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttling_never_lowers_delay_below_min_interval() {
        let transport = ScriptedTransport::new();
        transport.push(Reply::Status(429));
        let settings = GatewaySettings {
            min_interval: Duration::from_secs(20),
            max_delay: Duration::from_secs(10),
            ..GatewaySettings::default()
        };
        let h = harness_with(transport, settings);

        h.gateway.fetch("/anime/1", "jikan_anime_1", 30, Vec::new()).await.unwrap();
        assert_eq!(h.transport.call_count(), 2);
        assert_eq!(h.gateway.current_delay().await, Duration::from_secs(20));
    }

    #[test]
    fn test_escalate() {
        let secs = Duration::from_secs;
        assert_eq!(escalate(secs(1), secs(10)), secs(2));
        assert_eq!(escalate(secs(8), secs(10)), secs(10));
        assert_eq!(escalate(secs(10), secs(10)), secs(10));
        assert_eq!(escalate(secs(20), secs(10)), secs(20));
        assert_eq!(escalate(Duration::MAX, Duration::MAX), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_panic_fails_only_its_caller() {
        let transport = ScriptedTransport::new();
        transport.push(Reply::Panic);
        let h = harness(transport);

        let err = h
            .gateway
            .fetch("/anime/1", "jikan_anime_1", 30, Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Closed);

        let data = h.gateway.fetch("/anime/2", "jikan_anime_2", 30, Vec::new()).await.unwrap();
        assert_eq!(data, json!("/anime/2"));
        assert_eq!(h.transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_concurrent_keys_are_not_deduplicated() {
        let h = harness(ScriptedTransport::new().with_latency(Duration::from_millis(50)));

        let a = h.gateway.clone();
        let b = h.gateway.clone();
        let (ra, rb) = tokio::join!(
            a.fetch("/top/anime", "jikan_top", 30, Vec::new()),
            b.fetch("/top/anime", "jikan_top", 30, Vec::new()),
        );
        assert_eq!(ra.unwrap(), rb.unwrap());
        assert_eq!(h.transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processor_restarts_after_idle() {
        let h = harness(ScriptedTransport::new());

        h.gateway.fetch("/anime/1", "jikan_anime_1", 30, Vec::new()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!h.gateway.inner.state.lock().await.processing);

        h.gateway.fetch("/anime/2", "jikan_anime_2", 30, Vec::new()).await.unwrap();
        assert_eq!(h.transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache_and_stats() {
        let h = harness(ScriptedTransport::new());
        h.gateway.fetch("/anime/1", "jikan_anime_1", 30, Vec::new()).await.unwrap();
        h.gateway.fetch("/anime/2", "jikan_anime_2", 30, Vec::new()).await.unwrap();
        h.store.set("userSession", r#"{"id":7}"#).unwrap();

        let stats = h.gateway.cache_stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert!(stats.total_size_bytes > 0);

        assert_eq!(h.gateway.clear_cache().unwrap(), 2);
        assert_eq!(h.gateway.cache_stats().unwrap(), CacheStats::default());
        assert!(h.store.get("userSession").unwrap().is_some());

        h.gateway.fetch("/anime/1", "jikan_anime_1", 30, Vec::new()).await.unwrap();
        assert_eq!(h.transport.call_count(), 3);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = shared::Config::default().catalog;
        config.rate_limit.min_interval_ms = 250;
        config.rate_limit.max_attempts = 0;
        config.cache.key_prefix = "mal_".to_string();

        let settings = GatewaySettings::from_config(&config);
        assert_eq!(settings.min_interval, Duration::from_millis(250));
        assert_eq!(settings.max_delay, Duration::from_secs(10));
        assert_eq!(settings.max_attempts, 1);
        assert_eq!(settings.key_prefix, "mal_");
    }

    #[test]
    fn test_settings_from_config_raises_ceiling_to_min_interval() {
        let mut config = shared::Config::default().catalog;
        config.rate_limit.min_interval_ms = 20_000;
        config.rate_limit.max_delay_ms = 10_000;

        let settings = GatewaySettings::from_config(&config);
        assert_eq!(settings.min_interval, Duration::from_secs(20));
        assert_eq!(settings.max_delay, Duration::from_secs(20));
    }
}
