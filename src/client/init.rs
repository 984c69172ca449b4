//! Single-flight application configuration loading.
//!
//! One fetch runs at a time in a spawned task, so callers that stop waiting (for example after a
//! timeout) never cancel it. Success is kept for the lifetime of the loader. Failure resets the
//! slot before it is published, so the next caller starts exactly one new attempt.

// std
use std::sync::{
	Mutex, MutexGuard, PoisonError,
	atomic::{AtomicU64, Ordering},
};
// crates.io
use tokio::{runtime::Handle, sync::watch};
// self
use crate::{
	_prelude::*,
	config::Settings,
	http::client::Transport,
	metrics,
	model::{AppConfig, AppConfigEnvelope},
};

/// Application configuration endpoint relative to the API origin.
pub const APP_CONFIG_PATH: &str = "/hub/app-config";

type Outcome = std::result::Result<Arc<AppConfig>, Arc<Error>>;

/// Public view of the loader state.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum InitState {
	/// No fetch is running and none has succeeded.
	Idle,
	/// A fetch is in flight.
	Initializing,
	/// The configuration has been resolved.
	Ready,
}

#[derive(Debug)]
enum Slot {
	Idle,
	Pending { attempt: u64, outcome: watch::Receiver<Option<Outcome>> },
	Ready(Arc<AppConfig>),
}

/// Owns the at-most-one in-flight application configuration fetch.
#[derive(Debug)]
pub struct AppConfigLoader {
	settings: Arc<Settings>,
	transport: Transport,
	slot: Mutex<Slot>,
	attempts: AtomicU64,
}
impl AppConfigLoader {
	/// Create an idle loader.
	pub fn new(settings: Arc<Settings>, transport: Transport) -> Arc<Self> {
		Arc::new(Self {
			settings,
			transport,
			slot: Mutex::new(Slot::Idle),
			attempts: AtomicU64::new(0),
		})
	}

	/// Start a fetch on `runtime` unless one is already running or has succeeded.
	pub fn start(self: &Arc<Self>, runtime: &Handle) {
		let mut slot = self.lock_slot();

		if matches!(*slot, Slot::Idle) {
			self.spawn_locked(&mut slot, runtime);
		}
	}

	/// Current state.
	pub fn state(&self) -> InitState {
		match *self.lock_slot() {
			Slot::Idle => InitState::Idle,
			Slot::Pending { .. } => InitState::Initializing,
			Slot::Ready(_) => InitState::Ready,
		}
	}

	/// Number of fetches started so far.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Resolved configuration, if any, without waiting.
	pub fn get(&self) -> Option<Arc<AppConfig>> {
		match &*self.lock_slot() {
			Slot::Ready(app) => Some(app.clone()),
			_ => None,
		}
	}

	/// Wait for the configuration, joining the in-flight fetch or starting one.
	///
	/// Every caller joined to the same attempt observes the same value or the same failure. Starting
	/// a fetch needs a Tokio runtime; without one this fails with [`Error::RuntimeUnavailable`].
	pub async fn resolve(self: &Arc<Self>) -> Result<Arc<AppConfig>> {
		let mut outcome = {
			let mut slot = self.lock_slot();

			match &*slot {
				Slot::Ready(app) => return Ok(app.clone()),
				Slot::Pending { outcome, .. } => outcome.clone(),
				Slot::Idle => {
					let runtime = Handle::try_current().map_err(|_| Error::RuntimeUnavailable)?;

					self.spawn_locked(&mut slot, &runtime)
				},
			}
		};
		let published = outcome
			.wait_for(Option::is_some)
			.await
			.map(|value| value.clone())
			.map_err(|_| Error::InitializationAborted)?;

		match published {
			Some(Ok(app)) => Ok(app),
			Some(Err(source)) => Err(Error::AppConfig { source }),
			None => Err(Error::InitializationAborted),
		}
	}

	fn spawn_locked(
		self: &Arc<Self>,
		slot: &mut Slot,
		runtime: &Handle,
	) -> watch::Receiver<Option<Outcome>> {
		let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
		let (tx, rx) = watch::channel(None);
		let loader = self.clone();

		*slot = Slot::Pending { attempt, outcome: rx.clone() };

		tracing::debug!(attempt, "starting app config fetch");

		runtime.spawn(async move {
			let outcome = loader.fetch().await.map_err(Arc::new);

			metrics::record_app_config_fetch(outcome.is_ok());

			{
				let mut slot = loader.lock_slot();

				if matches!(&*slot, Slot::Pending { attempt: current, .. } if *current == attempt) {
					*slot = match &outcome {
						Ok(app) => Slot::Ready(app.clone()),
						Err(_) => Slot::Idle,
					};
				}
			}

			match &outcome {
				Ok(app) => tracing::debug!(attempt, app_id = %app.id, "app config resolved"),
				Err(err) => tracing::warn!(attempt, error = %err, "app config fetch failed"),
			}

			let _ = tx.send(Some(outcome));
		});

		rx
	}

	async fn fetch(&self) -> Result<Arc<AppConfig>> {
		let url = self.settings.endpoint(APP_CONFIG_PATH)?;
		let headers = self.settings.app_key_headers()?;
		let envelope = self.transport.get::<AppConfigEnvelope>(url, headers).await?;

		Ok(Arc::new(envelope.app))
	}

	fn lock_slot(&self) -> MutexGuard<'_, Slot> {
		self.slot.lock().unwrap_or_else(PoisonError::into_inner)
	}
}
