//! Fakes for gateway and catalog tests.

use crate::api::{Params, Transport};
use crate::clock::Clock;
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Clock the test moves by hand
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Scripted answer for one transport call
#[derive(Debug, Clone)]
pub enum Reply {
    Body(Value),
    Status(u16),
    /// The transport panics mid-request
    Panic,
}

/// A call the transport received
#[derive(Debug, Clone)]
pub struct Call {
    pub endpoint: String,
    pub params: Params,
    pub at: Instant,
}

/// Transport that plays back scripted replies.
///
/// Once the script runs out it answers `{"data": <endpoint>}`.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push(&self, reply: Reply) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, endpoint: &str, params: &Params) -> GatewayResult<Value> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        self.calls.lock().unwrap().push(Call {
            endpoint: endpoint.to_string(),
            params: params.clone(),
            at: Instant::now(),
        });
        let reply = self.script.lock().unwrap().pop_front();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Status(status)) => Err(GatewayError::Status {
                status,
                body: String::new(),
            }),
            Some(Reply::Panic) => panic!("scripted transport panic for {}", endpoint),
            None => Ok(json!({ "data": endpoint })),
        }
    }
}
