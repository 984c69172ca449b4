//! Per-client cache of fetched user records, keyed by application and user id.
//!
//! Every write bumps the user's generation and drops the cached record. Reads capture the generation
//! before going to the network and only install their result if no write happened in between, so a
//! record fetched before a write can never be served after it.

// std
use std::{
	collections::HashMap,
	sync::{Mutex, MutexGuard, PoisonError},
};
// self
use crate::{_prelude::*, metrics, model::UserInfo};

/// Token returned by [`UserRecordCache::begin_read`] and consumed by
/// [`UserRecordCache::complete_read`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadTicket {
	key: RecordKey,
	generation: u64,
}

type RecordKey = (String, String);

#[derive(Debug, Default)]
struct Slot {
	generation: u64,
	record: Option<Arc<UserInfo>>,
}

/// User records keyed by `(app_id, user_id)`.
#[derive(Debug, Default)]
pub struct UserRecordCache {
	slots: Mutex<HashMap<RecordKey, Slot>>,
}
impl UserRecordCache {
	/// Create an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Cached record for `user_id` under `app_id`, if any.
	pub fn get(&self, app_id: &str, user_id: &str) -> Option<Arc<UserInfo>> {
		let record = self.lock().get(&key(app_id, user_id)).and_then(|slot| slot.record.clone());

		metrics::record_user_cache_lookup(record.is_some());

		record
	}

	/// Capture the current write generation for `user_id` ahead of a network read.
	pub fn begin_read(&self, app_id: &str, user_id: &str) -> ReadTicket {
		let key = key(app_id, user_id);
		let generation = self.lock().get(&key).map(|slot| slot.generation).unwrap_or_default();

		ReadTicket { key, generation }
	}

	/// Install a fetched record unless a write for the same user happened since `ticket`.
	///
	/// Returns whether the record was stored.
	pub fn complete_read(&self, ticket: ReadTicket, record: Arc<UserInfo>) -> bool {
		let mut slots = self.lock();
		let slot = slots.entry(ticket.key).or_default();

		if slot.generation != ticket.generation {
			tracing::debug!("discarding user record fetched before a newer write");

			return false;
		}

		slot.record = Some(record);

		true
	}

	/// Drop the record for `user_id` and fence off reads that started before this call.
	pub fn invalidate(&self, app_id: &str, user_id: &str) {
		let mut slots = self.lock();
		let slot = slots.entry(key(app_id, user_id)).or_default();

		slot.generation = slot.generation.wrapping_add(1);

		if slot.record.take().is_some() {
			metrics::record_user_cache_eviction();
		}
	}

	/// Number of cached records.
	pub fn len(&self) -> usize {
		self.lock().values().filter(|slot| slot.record.is_some()).count()
	}

	/// Whether no records are cached.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<RecordKey, Slot>> {
		self.slots.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

fn key(app_id: &str, user_id: &str) -> RecordKey {
	(app_id.to_owned(), user_id.to_owned())
}
