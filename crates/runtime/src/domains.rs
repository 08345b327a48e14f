//! Per-session domain instance cache.
//!
//! Each domain wrapper type is instantiated at most once per session, lazily,
//! keyed by its [`TypeId`]. [`DashMap`]'s entry API holds the shard lock while
//! the factory runs, so concurrent first accesses construct exactly once.

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use crate::session::Session;

/// A protocol domain wrapper bound to a session.
///
/// Implemented by the per-domain API objects; [`Session::domain`] hands out the
/// session's single shared instance.
pub trait Domain: Send + Sync + 'static {
	/// Protocol domain name, e.g. `"Page"`.
	const NAME: &'static str;

	/// Constructs the wrapper. Called at most once per session.
	///
	/// Runs while the cache holds a lock on its map, so it must not call
	/// [`Session::domain`] or [`Session::get_or_create_domain`]. Fetch other
	/// domains lazily from the methods instead.
	fn new(session: Session) -> Self;
}

type Instance = Arc<dyn Any + Send + Sync>;

/// Thread-safe map from domain type to its instance.
///
/// Factories must not access the cache themselves.
#[derive(Default)]
pub struct DomainCache {
	instances: DashMap<TypeId, Instance>,
	closed: AtomicBool,
}

impl DomainCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the cached `T`, constructing it with `factory` on first access.
	///
	/// After [`clear`](Self::clear) instances are still constructed but no
	/// longer retained.
	pub fn get_or_insert_with<T, F>(&self, factory: F) -> Arc<T>
	where
		T: Send + Sync + 'static,
		F: FnOnce() -> T,
	{
		if self.closed.load(Ordering::SeqCst) {
			return Arc::new(factory());
		}

		let instance = self
			.instances
			.entry(TypeId::of::<T>())
			.or_insert_with(|| {
				tracing::debug!(domain = std::any::type_name::<T>(), "Creating domain instance");
				Arc::new(factory()) as Instance
			})
			.clone();

		if self.closed.load(Ordering::SeqCst) {
			self.instances.remove(&TypeId::of::<T>());
		}

		instance
			.downcast::<T>()
			.expect("domain cache entries are keyed by their own TypeId")
	}

	/// Returns the cached `T` without constructing it.
	pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
		let instance = self.instances.get(&TypeId::of::<T>())?.value().clone();
		instance.downcast::<T>().ok()
	}

	/// Drops all instances and stops caching new ones.
	///
	/// Breaks the session/wrapper reference cycle when the session closes.
	pub fn clear(&self) {
		self.closed.store(true, Ordering::SeqCst);
		self.instances.clear();
	}

	pub fn len(&self) -> usize {
		self.instances.len()
	}

	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}
}
