//! Worker pool that feeds one [`TileLoader`] from a bounded [`TaskQueue`].
//!
//! Every pool owns a fixed number of long-lived tokio tasks. A worker pops the most urgent task,
//! runs the loader without holding any lock, and reports the [`TileOutcome`] to the pool's
//! [`ProviderListener`].
//!
//! A loader error that carries a [`SystemicFailure`] suspends the pool: all queued tasks are
//! drained without being attempted, and new submissions are rejected until the backoff expires,
//! [`ProviderPool::reset`] is called, or a task that was already running succeeds.

use super::{ProviderListener, PushOutcome, TaskPriority, TaskQueue, TileLoader, TileOutcome};
use crate::config::ProviderSettings;
use parking_lot::Mutex;
use std::{
	fmt::{self, Debug},
	pin::pin,
	sync::{
		Arc, Weak,
		atomic::{AtomicBool, Ordering},
	},
	time::{Duration, Instant},
};
use tilecascade_core::{SystemicFailure, TileKey, systemic_cause};
use tokio::{runtime::Handle, sync::Notify, task::JoinHandle};

/// Result of [`ProviderPool::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
	/// The pool will report an outcome for the key.
	Queued,
	/// The pool is suspended or shut down and will not look at the key.
	Rejected,
}

struct PoolShared {
	index: usize,
	loader: Arc<dyn TileLoader>,
	queue: Mutex<TaskQueue>,
	notify: Notify,
	suspended_until: Mutex<Option<Instant>>,
	backoff: Duration,
	shutdown: AtomicBool,
	listener: Weak<dyn ProviderListener>,
}

impl PoolShared {
	fn name(&self) -> &str {
		self.loader.name()
	}

	fn report(&self, key: TileKey, outcome: TileOutcome) {
		if let Some(listener) = self.listener.upgrade() {
			listener.on_tile_outcome(self.index, key, outcome);
		}
	}

	fn is_suspended(&self) -> bool {
		let mut suspended_until = self.suspended_until.lock();
		match *suspended_until {
			Some(until) if Instant::now() < until => true,
			Some(_) => {
				log::info!("provider {}: backoff expired, accepting tiles again", self.name());
				*suspended_until = None;
				false
			}
			None => false,
		}
	}

	fn lift_suspension(&self) {
		if self.suspended_until.lock().take().is_some() {
			log::info!("provider {}: recovered", self.name());
		}
	}

	fn suspend(&self, key: TileKey, failure: &SystemicFailure, err: &anyhow::Error) {
		*self.suspended_until.lock() = Some(Instant::now() + self.backoff);
		let drained = self.queue.lock().drain();
		log::warn!(
			"provider {}: {err:#} while loading {key}; drained {} queued tiles, suspended for {:?}",
			self.name(),
			drained.len(),
			self.backoff
		);

		let Some(listener) = self.listener.upgrade() else {
			return;
		};
		listener.on_systemic_failure(self.index, failure);
		listener.on_tile_outcome(self.index, key, TileOutcome::Failed);
		for key in drained {
			listener.on_tile_outcome(self.index, key, TileOutcome::Drained);
		}
	}

	async fn process(&self, key: TileKey) {
		log::trace!("provider {}: loading {key}", self.name());
		let result = self.loader.load_tile(&key).await;
		self.queue.lock().finish(&key);

		let outcome = match result {
			Ok(Some(image)) => {
				self.lift_suspension();
				TileOutcome::Loaded(image)
			}
			Ok(None) => TileOutcome::NotFound,
			Err(err) => {
				if let Some(failure) = systemic_cause(&err) {
					self.suspend(key, failure, &err);
					return;
				}
				log::warn!("provider {}: failed to load {key}: {err:#}", self.name());
				TileOutcome::Failed
			}
		};
		self.report(key, outcome);
	}
}

async fn run_worker(shared: Arc<PoolShared>) {
	loop {
		let mut notified = pin!(shared.notify.notified());
		notified.as_mut().enable();

		if shared.shutdown.load(Ordering::Acquire) {
			break;
		}

		let next = shared.queue.lock().pop();
		match next {
			Some(key) => shared.process(key).await,
			None => notified.await,
		}
	}
}

/// A fixed-size pool of workers around one [`TileLoader`].
pub struct ProviderPool {
	inner: Arc<PoolShared>,
	workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ProviderPool {
	/// Spawn `settings.workers` workers on `handle`.
	///
	/// `index` identifies this pool in the listener callbacks.
	pub fn new(
		index: usize,
		loader: Arc<dyn TileLoader>,
		settings: ProviderSettings,
		backoff: Duration,
		listener: Weak<dyn ProviderListener>,
		handle: &Handle,
	) -> ProviderPool {
		let inner = Arc::new(PoolShared {
			index,
			loader,
			queue: Mutex::new(TaskQueue::new(settings.queue_capacity)),
			notify: Notify::new(),
			suspended_until: Mutex::new(None),
			backoff,
			shutdown: AtomicBool::new(false),
			listener,
		});

		let workers = (0..settings.workers.max(1))
			.map(|_| handle.spawn(run_worker(inner.clone())))
			.collect();

		ProviderPool {
			inner,
			workers: Mutex::new(workers),
		}
	}

	pub fn name(&self) -> &str {
		self.inner.name()
	}

	pub fn index(&self) -> usize {
		self.inner.index
	}

	/// Queue `key`, or re-prioritize it if it is already queued.
	///
	/// A task pushed out of the full queue is reported as [`TileOutcome::Dropped`] before this
	/// returns. That can be `key` itself if its priority is the lowest in the queue.
	pub fn submit(&self, key: TileKey, priority: TaskPriority) -> SubmitOutcome {
		if self.inner.shutdown.load(Ordering::Acquire) || self.inner.is_suspended() {
			log::trace!("provider {}: rejected {key}", self.name());
			return SubmitOutcome::Rejected;
		}

		let outcome = self.inner.queue.lock().push(key, priority);
		match outcome {
			PushOutcome::Queued { dropped } => {
				self.inner.notify.notify_one();
				if let Some(dropped) = dropped {
					log::debug!("provider {}: queue full, dropped {dropped}", self.name());
					self.inner.report(dropped, TileOutcome::Dropped);
				}
			}
			PushOutcome::Reprioritized | PushOutcome::Running => {}
		}
		SubmitOutcome::Queued
	}

	/// Remove `key` from the queue if it has not started yet.
	pub fn cancel(&self, key: &TileKey) -> bool {
		self.inner.queue.lock().remove(key)
	}

	/// Lift a suspension caused by a systemic failure.
	pub fn reset(&self) {
		self.inner.lift_suspension();
	}

	/// Stop all workers. Queued tasks are discarded and returned without being reported.
	pub fn shutdown(&self) -> Vec<TileKey> {
		self.inner.shutdown.store(true, Ordering::Release);
		let drained = self.inner.queue.lock().drain();
		self.inner.notify.notify_waiters();
		drained
	}

	pub fn queued_len(&self) -> usize {
		self.inner.queue.lock().len()
	}

	pub fn is_suspended(&self) -> bool {
		self.inner.is_suspended()
	}
}

impl Drop for ProviderPool {
	fn drop(&mut self) {
		self.shutdown();
		for worker in self.workers.lock().drain(..) {
			worker.abort();
		}
	}
}

impl Debug for ProviderPool {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProviderPool")
			.field("index", &self.inner.index)
			.field("loader", &self.inner.loader)
			.field("queued", &self.queued_len())
			.field("suspended", &self.is_suspended())
			.finish()
	}
}
