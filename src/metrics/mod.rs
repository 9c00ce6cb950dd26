use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;


lazy_static! {
    pub static ref CACHE_LOOKUPS: IntCounterVec = IntCounterVec::new(
        Opts::new("cache_lookups", "Feedback cache lookups by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref REBUILD_RESULTS: IntCounterVec = IntCounterVec::new(
        Opts::new("rebuild_results", "Rebuilder settlements by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref STALE_MARKERS: IntCounter =
        IntCounter::new("stale_markers", "Feedback-changed notifications received")
            .expect("metric can not be created");

    pub static ref RECONNECT_ATTEMPTS: IntCounter =
        IntCounter::new("reconnect_attempts", "Connection attempts to the remote engine")
            .expect("metric can not be created");

    pub static ref COMPOSITE_FALLBACKS: IntCounter =
        IntCounter::new("composite_fallbacks", "Composites that fell back to the base image")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("bridge".to_string()), None).expect("registry can be created");
}

pub(crate) const LOOKUP_HIT: &str = "hit";
pub(crate) const LOOKUP_MISS: &str = "miss";
pub(crate) const LOOKUP_STALE: &str = "stale";

pub(crate) const REBUILD_WRITTEN: &str = "written";
pub(crate) const REBUILD_FAILED: &str = "failed";
pub(crate) const REBUILD_REJECTED: &str = "rejected";

pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(REBUILD_RESULTS.clone()),
        Box::new(STALE_MARKERS.clone()),
        Box::new(RECONNECT_ATTEMPTS.clone()),
        Box::new(COMPOSITE_FALLBACKS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            // AlreadyReg is expected when called twice on the same registry
            tracing::debug!("collector registration skipped: {:?}", e);
        }
    }
}

/// Prometheus text exposition of `registry`
pub fn encode_metrics(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("metrics could not be from_utf8'd: {}", e);
        String::new()
    })
}
