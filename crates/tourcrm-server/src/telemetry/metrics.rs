// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::time::Duration;

use tokio::sync::Mutex;

const MAX_LATENCY_SAMPLES: usize = 2048;

/// Request counters and latency samples exposed on `/metrics`.
#[derive(Default)]
pub struct RequestMetrics {
    counts: Mutex<BTreeMap<(String, String, u16), u64>>,
    latency_ns: Mutex<BTreeMap<String, VecDeque<u64>>>,
}

impl RequestMetrics {
    pub async fn observe(&self, route: &str, method: &str, status: u16, elapsed: Duration) {
        *self
            .counts
            .lock()
            .await
            .entry((route.to_string(), method.to_string(), status))
            .or_insert(0) += 1;
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let mut latency = self.latency_ns.lock().await;
        let samples = latency.entry(route.to_string()).or_default();
        if samples.len() == MAX_LATENCY_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(nanos);
    }

    /// Prometheus text exposition, stable order.
    pub async fn render(&self, ready: bool, idempotency_entries: usize) -> String {
        let mut body = String::new();
        body.push_str("# TYPE crm_http_requests_total counter\n");
        for ((route, method, status), count) in self.counts.lock().await.iter() {
            let _ = writeln!(
                body,
                "crm_http_requests_total{{route=\"{}\",method=\"{method}\",status=\"{status}\"}} {count}",
                escape_label(route)
            );
        }
        body.push_str("# TYPE crm_http_request_latency_p95_seconds gauge\n");
        for (route, samples) in self.latency_ns.lock().await.iter() {
            let samples: Vec<u64> = samples.iter().copied().collect();
            let _ = writeln!(
                body,
                "crm_http_request_latency_p95_seconds{{route=\"{}\"}} {:.6}",
                escape_label(route),
                nanos_to_secs(percentile_ns(&samples, 0.95))
            );
        }
        body.push_str("# TYPE crm_ready gauge\n");
        let _ = writeln!(body, "crm_ready {}", u8::from(ready));
        body.push_str("# TYPE crm_idempotency_cache_entries gauge\n");
        let _ = writeln!(body, "crm_idempotency_cache_entries {idempotency_entries}");
        body
    }
}

#[allow(clippy::cast_precision_loss)]
fn nanos_to_secs(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000_000.0
}

/// Nearest-rank percentile; 0 for no samples.
pub(crate) fn percentile_ns(values: &[u64], pct: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut v = values.to_vec();
    v.sort_unstable();
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let idx = ((v.len() as f64 - 1.0) * pct).round() as usize;
    v[idx.min(v.len() - 1)]
}

fn escape_label(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
