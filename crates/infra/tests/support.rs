//! Shared helpers for infra integration tests

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use hubwire_common::resilience::MockClock;
use hubwire_domain::ClientConfig;
use hubwire_infra::{ApiClient, Transport, TransportError, TransportRequest, TransportResponse};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Wall-clock start of every mock clock, 2023-11-14T22:13:20Z
pub const CLOCK_START_MS: u64 = 1_700_000_000_000;

/// Config with instant retries so tests never wait on backoff
pub fn fast_config(base_url: impl Into<String>) -> ClientConfig {
    let mut config = ClientConfig::new(base_url);
    config.retry_delay_ms = 1;
    config.retry_jitter_ms = 0;
    config.timeout_ms = 2_000;
    config
}

/// In-memory transport that records requests and replays scripted statuses
///
/// Unscripted calls answer `200` with `{"call": <n>}`.
#[derive(Default)]
pub struct CountingTransport {
    requests: Mutex<Vec<TransportRequest>>,
    statuses: Mutex<VecDeque<u16>>,
}

impl CountingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue statuses for the next calls
    pub fn script(&self, statuses: impl IntoIterator<Item = u16>) {
        self.statuses.lock().extend(statuses);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<TransportRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn send(
        &self,
        request: TransportRequest,
        _cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len()
        };
        let status = self.statuses.lock().pop_front().unwrap_or(200);
        Ok(TransportResponse::new(status, serde_json::json!({ "call": call }).to_string())
            .with_header("content-type", "application/json"))
    }
}

/// Client wired to a [`CountingTransport`] and a shared [`MockClock`]
pub fn mock_client(config: ClientConfig) -> (ApiClient, Arc<CountingTransport>, MockClock) {
    let transport = CountingTransport::new();
    let clock = MockClock::starting_at_millis(CLOCK_START_MS);
    let client = ApiClient::builder()
        .config(config)
        .transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .clock(Arc::new(clock.clone()))
        .build()
        .expect("client should build");
    (client, transport, clock)
}
