use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Assessment flow
    pub static ref FLOWS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "assessment_flows_total",
        "Assessment flows by lifecycle event",
        &["event"]
    )
    .unwrap();

    pub static ref FLOWS_ACTIVE: IntGauge = register_int_gauge!(
        "assessment_flows_active",
        "Number of assessment flows held in memory"
    )
    .unwrap();

    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_submitted_total",
        "Graded answers by mode and correctness",
        &["mode", "correct"]
    )
    .unwrap();

    pub static ref INTERVENTIONS_SHOWN_TOTAL: IntCounterVec = register_int_counter_vec!(
        "interventions_shown_total",
        "Remedial media shown to students",
        &["kind"]
    )
    .unwrap();

    pub static ref SET_SWAPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "question_set_swaps_total",
        "Switches between the default and the alternate set",
        &["to"]
    )
    .unwrap();

    pub static ref COMPLETION_WRITE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "completion_write_failures_total",
        "Completion records that could not be stored"
    )
    .unwrap();

    // Quiz
    pub static ref QUIZZES_ACTIVE: IntGauge = register_int_gauge!(
        "quizzes_active",
        "Number of adaptive quizzes held in memory"
    )
    .unwrap();

    pub static ref QUIZ_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_attempts_total",
        "Quiz attempts by difficulty tier",
        &["tier"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

pub fn record_answer(mode: &str, correct: bool) {
    ANSWERS_SUBMITTED_TOTAL
        .with_label_values(&[mode, if correct { "true" } else { "false" }])
        .inc();
}
