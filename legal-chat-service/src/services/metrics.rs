//! Prometheus metrics for legal-chat-service.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Chat metrics
pub static CHAT_TURNS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GENAI_TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GENAI_PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static GENAI_PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static USAGE_REJECTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CITATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Database metrics
pub static DB_OPERATION_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static DB_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn counter(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    IntCounterVec::new(Opts::new(name, help), labels)
        .unwrap_or_else(|e| panic!("Failed to create {} metric: {}", name, e))
}

fn histogram(name: &str, help: &str, buckets: Vec<f64>, labels: &[&str]) -> HistogramVec {
    HistogramVec::new(HistogramOpts::new(name, help).buckets(buckets), labels)
        .unwrap_or_else(|e| panic!("Failed to create {} metric: {}", name, e))
}

/// Initialize all metrics. Safe to call more than once; later calls are no-ops.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let http_requests = counter(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"],
    );
    let http_duration = histogram(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        &["method", "path"],
    );
    let chat_turns = counter(
        "chat_turns_total",
        "Chat turns by model and outcome",
        &["model", "outcome"],
    );
    let tokens = counter(
        "genai_tokens_total",
        "Total tokens processed",
        &["model", "type"],
    );
    let provider_latency = histogram(
        "genai_provider_latency_seconds",
        "AI provider API latency in seconds",
        vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0],
        &["provider", "model"],
    );
    let provider_errors = counter(
        "genai_provider_errors_total",
        "Total AI provider errors",
        &["provider", "error_type"],
    );
    let usage_rejections = counter(
        "usage_rejections_total",
        "Requests rejected by the usage gate",
        &["reason"],
    );
    let citations = counter(
        "citations_total",
        "Grounding citations by outcome",
        &["outcome"],
    );
    let db_duration = histogram(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0],
        &["operation", "collection"],
    );
    let db_errors = counter(
        "db_errors_total",
        "Total database errors",
        &["operation", "collection"],
    );

    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(http_requests.clone()),
        Box::new(http_duration.clone()),
        Box::new(chat_turns.clone()),
        Box::new(tokens.clone()),
        Box::new(provider_latency.clone()),
        Box::new(provider_errors.clone()),
        Box::new(usage_rejections.clone()),
        Box::new(citations.clone()),
        Box::new(db_duration.clone()),
        Box::new(db_errors.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            tracing::error!(error = %e, "Failed to register metric");
        }
    }

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(http_requests);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(http_duration);
    let _ = CHAT_TURNS_TOTAL.set(chat_turns);
    let _ = GENAI_TOKENS_TOTAL.set(tokens);
    let _ = GENAI_PROVIDER_LATENCY_SECONDS.set(provider_latency);
    let _ = GENAI_PROVIDER_ERRORS_TOTAL.set(provider_errors);
    let _ = USAGE_REJECTIONS_TOTAL.set(usage_rejections);
    let _ = CITATIONS_TOTAL.set(citations);
    let _ = DB_OPERATION_DURATION_SECONDS.set(db_duration);
    let _ = DB_ERRORS_TOTAL.set(db_errors);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

// Helper functions for recording metrics

pub fn record_http_request(method: &str, path: &str, status: &str, duration_secs: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, path, status]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

/// `outcome` is one of `completed`, `failed` or `aborted`.
pub fn record_chat_turn(model: &str, outcome: &str) {
    if let Some(counter) = CHAT_TURNS_TOTAL.get() {
        counter.with_label_values(&[model, outcome]).inc();
    }
}

pub fn record_tokens(model: &str, input_tokens: u32, output_tokens: u32) {
    if let Some(counter) = GENAI_TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[model, "input"])
            .inc_by(u64::from(input_tokens));
        counter
            .with_label_values(&[model, "output"])
            .inc_by(u64::from(output_tokens));
    }
}

pub fn record_provider_latency(provider: &str, model: &str, duration_secs: f64) {
    if let Some(histogram) = GENAI_PROVIDER_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, model])
            .observe(duration_secs);
    }
}

pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(counter) = GENAI_PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

pub fn record_usage_rejection(reason: &str) {
    if let Some(counter) = USAGE_REJECTIONS_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

pub fn record_citations(emitted: usize, dropped: usize) {
    if let Some(counter) = CITATIONS_TOTAL.get() {
        counter
            .with_label_values(&["emitted"])
            .inc_by(emitted as u64);
        counter
            .with_label_values(&["dropped"])
            .inc_by(dropped as u64);
    }
}

pub fn record_db_operation(operation: &str, collection: &str, duration_secs: f64) {
    if let Some(histogram) = DB_OPERATION_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[operation, collection])
            .observe(duration_secs);
    }
}

pub fn record_db_error(operation: &str, collection: &str) {
    if let Some(counter) = DB_ERRORS_TOTAL.get() {
        counter.with_label_values(&[operation, collection]).inc();
    }
}
