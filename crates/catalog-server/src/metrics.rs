use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};

pub static SEARCH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "search_requests_total",
        "Search requests by variant and outcome",
        &["variant", "outcome"]
    )
    .unwrap()
});

pub static SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "search_duration_seconds",
        "Search request latency by variant",
        &["variant"]
    )
    .unwrap()
});
