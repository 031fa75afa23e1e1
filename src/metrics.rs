//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Authentication Metrics
    pub static ref AUTH_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("authhub_auth_attempts_total", "Total number of login attempts"),
        &["method", "outcome"]
    ).expect("metric can be created");
    pub static ref USERS_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("authhub_users_created_total", "Total number of user records created"),
        &["method"]
    ).expect("metric can be created");

    // Session Metrics
    pub static ref SESSIONS_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("authhub_sessions_created_total", "Total number of sessions issued"),
        &["method"]
    ).expect("metric can be created");
    pub static ref SESSION_RESOLUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("authhub_session_resolutions_total", "Total number of session cookie checks"),
        &["outcome"]
    ).expect("metric can be created");

    // Provider Metrics
    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "authhub_provider_request_duration_seconds",
            "OAuth provider request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["provider", "step"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("authhub_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(AUTH_ATTEMPTS_TOTAL.clone()))
        .expect("AUTH_ATTEMPTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(USERS_CREATED_TOTAL.clone()))
        .expect("USERS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SESSIONS_CREATED_TOTAL.clone()))
        .expect("SESSIONS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SESSION_RESOLUTIONS_TOTAL.clone()))
        .expect("SESSION_RESOLUTIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PROVIDER_REQUEST_DURATION_SECONDS.clone()))
        .expect("PROVIDER_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record one login attempt.
pub fn record_auth_attempt(method: &str, outcome: &str) {
    AUTH_ATTEMPTS_TOTAL
        .with_label_values(&[method, outcome])
        .inc();
}

/// Observe the latency of one outbound provider call.
pub fn observe_provider_request(provider: &str, step: &str, elapsed: Duration) {
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[provider, step])
        .observe(elapsed.as_secs_f64());
}
