//! Metrics helpers recorded through the `metrics` facade.
//!
//! Nothing is exported unless the application installs a recorder, e.g. through
//! [`install_default_exporter`] when the `prometheus` feature is enabled.

// crates.io
use metrics::Label;
use smallvec::SmallVec;

type LabelSet = SmallVec<[Label; 2]>;

const METRIC_APP_CONFIG_FETCH_TOTAL: &str = "rownd_app_config_fetch_total";
const METRIC_USER_CACHE_HITS_TOTAL: &str = "rownd_user_cache_hits_total";
const METRIC_USER_CACHE_MISSES_TOTAL: &str = "rownd_user_cache_misses_total";
const METRIC_USER_CACHE_EVICTIONS_TOTAL: &str = "rownd_user_cache_evictions_total";
const METRIC_DISCOVERY_FETCH_TOTAL: &str = "rownd_discovery_fetch_total";
const METRIC_JWKS_FETCH_TOTAL: &str = "rownd_jwks_fetch_total";
const METRIC_TOKEN_VALIDATIONS_TOTAL: &str = "rownd_token_validations_total";

#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: std::sync::OnceLock<
	metrics_exporter_prometheus::PrometheusHandle,
> = std::sync::OnceLock::new();

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> crate::Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| crate::Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static metrics_exporter_prometheus::PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record an application configuration fetch outcome.
pub fn record_app_config_fetch(success: bool) {
	metrics::counter!(METRIC_APP_CONFIG_FETCH_TOTAL, status_labels(success).iter()).increment(1);
}

/// Record a user-record cache lookup.
pub fn record_user_cache_lookup(hit: bool) {
	if hit {
		metrics::counter!(METRIC_USER_CACHE_HITS_TOTAL).increment(1);
	} else {
		metrics::counter!(METRIC_USER_CACHE_MISSES_TOTAL).increment(1);
	}
}

/// Record a user-record eviction caused by a write.
pub fn record_user_cache_eviction() {
	metrics::counter!(METRIC_USER_CACHE_EVICTIONS_TOTAL).increment(1);
}

/// Record a discovery document fetch for `origin`.
pub fn record_discovery_fetch(origin: &str, success: bool) {
	let mut labels = status_labels(success);

	labels.push(Label::new("origin", origin.to_owned()));

	metrics::counter!(METRIC_DISCOVERY_FETCH_TOTAL, labels.iter()).increment(1);
}

/// Record a remote key set fetch.
pub fn record_jwks_fetch(success: bool) {
	metrics::counter!(METRIC_JWKS_FETCH_TOTAL, status_labels(success).iter()).increment(1);
}

/// Record a token validation outcome.
pub fn record_token_validation(outcome: &'static str) {
	metrics::counter!(METRIC_TOKEN_VALIDATIONS_TOTAL, "outcome" => outcome).increment(1);
}

fn status_labels(success: bool) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("status", if success { "success" } else { "error" }));

	labels
}
