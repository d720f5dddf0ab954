// ============================================================
// Layer 6 — Service Telemetry
// ============================================================
// Prometheus counters and histograms for the inference service,
// exposed in text exposition format on GET /metrics.
//
//   http_requests_total{endpoint}            counter
//   http_request_duration_seconds{endpoint}  histogram
//   predictions_total{label}                 counter
//
// Each ServiceMetrics owns its own Registry so that tests can
// build independent instances without clashing on the global
// default registry.

use anyhow::{Context, Result};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::domain::label::ClassLabel;

pub struct ServiceMetrics {
    registry: Registry,
    requests: IntCounterVec,
    latency:  HistogramVec,
    predictions: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["endpoint"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "Request latency in seconds"),
            &["endpoint"],
        )?;
        let predictions = IntCounterVec::new(
            Opts::new("predictions_total", "Predictions by label"),
            &["label"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(predictions.clone()))?;

        Ok(Self { registry, requests, latency, predictions })
    }

    /// Count one request to `endpoint` as it arrives.
    pub fn record_request(&self, endpoint: &str) {
        self.requests.with_label_values(&[endpoint]).inc();
    }

    /// Record how long a finished request to `endpoint` took.
    pub fn observe_latency(&self, endpoint: &str, seconds: f64) {
        self.latency.with_label_values(&[endpoint]).observe(seconds);
    }

    pub fn observe_prediction(&self, label: ClassLabel) {
        self.predictions.with_label_values(&[label.as_str()]).inc();
    }

    pub fn request_count(&self, endpoint: &str) -> u64 {
        self.requests.with_label_values(&[endpoint]).get()
    }

    pub fn prediction_count(&self, label: ClassLabel) -> u64 {
        self.predictions.with_label_values(&[label.as_str()]).get()
    }

    /// Render every registered family in text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Cannot encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not UTF-8")
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_endpoint() {
        let m = ServiceMetrics::new().unwrap();
        m.record_request("/predict");
        m.record_request("/predict");
        m.record_request("/health");
        assert_eq!(m.request_count("/predict"), 2);
        assert_eq!(m.request_count("/health"), 1);
        assert_eq!(m.request_count("/metrics"), 0);
    }

    #[test]
    fn test_render_contains_families() {
        let m = ServiceMetrics::new().unwrap();
        m.record_request("/predict");
        m.observe_latency("/predict", 0.05);
        m.observe_prediction(ClassLabel::Dog);
        let text = m.render().unwrap();
        assert!(text.contains("http_requests_total{endpoint=\"/predict\"} 1"));
        assert!(text.contains("http_request_duration_seconds_bucket"));
        assert!(text.contains("predictions_total{label=\"Dog\"} 1"));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = ServiceMetrics::new().unwrap();
        let b = ServiceMetrics::new().unwrap();
        a.observe_prediction(ClassLabel::Cat);
        assert_eq!(a.prediction_count(ClassLabel::Cat), 1);
        assert_eq!(b.prediction_count(ClassLabel::Cat), 0);
    }
}
