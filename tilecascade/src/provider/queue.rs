//! Bounded priority queue of tile tasks for one provider.
//!
//! Each [`TileKey`] is queued at most once. Tasks are taken highest priority first and, within
//! a priority, most recently requested first: tiles are requested because they are visible now,
//! so older requests are the ones most likely to have scrolled away. For the same reason a full
//! queue always takes the new request and drops the lowest-priority, least recently requested
//! of the tasks already queued, even if that task outranks the newcomer.

use std::collections::{BTreeMap, HashMap, HashSet};
use tilecascade_core::TileKey;

/// Urgency of a tile request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
	/// Tiles fetched ahead of time, e.g. around the viewport.
	Low,
	#[default]
	Normal,
	High,
}

type Rank = (TaskPriority, u64);

/// Result of [`TaskQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
	/// The task was added. `dropped` is the task evicted to make room, if any.
	Queued { dropped: Option<TileKey> },
	/// The task was already queued and has been moved to its new rank.
	Reprioritized,
	/// The tile is being resolved by a worker right now.
	Running,
}

#[derive(Debug)]
pub struct TaskQueue {
	capacity: usize,
	sequence: u64,
	order: BTreeMap<Rank, TileKey>,
	ranks: HashMap<TileKey, Rank>,
	running: HashSet<TileKey>,
}

impl TaskQueue {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity: capacity.max(1),
			sequence: 0,
			order: BTreeMap::new(),
			ranks: HashMap::new(),
			running: HashSet::new(),
		}
	}

	pub fn push(&mut self, key: TileKey, priority: TaskPriority) -> PushOutcome {
		if self.running.contains(&key) {
			return PushOutcome::Running;
		}

		self.sequence += 1;
		let rank = (priority, self.sequence);

		if let Some(previous) = self.ranks.insert(key, rank) {
			self.order.remove(&previous);
			self.order.insert(rank, key);
			return PushOutcome::Reprioritized;
		}

		let mut dropped = None;
		if self.order.len() >= self.capacity
			&& let Some((_, oldest)) = self.order.pop_first()
		{
			self.ranks.remove(&oldest);
			dropped = Some(oldest);
		}
		self.order.insert(rank, key);
		PushOutcome::Queued { dropped }
	}

	/// Take the most urgent task and mark it as running.
	pub fn pop(&mut self) -> Option<TileKey> {
		let (_, key) = self.order.pop_last()?;
		self.ranks.remove(&key);
		self.running.insert(key);
		Some(key)
	}

	/// Mark a running task as done.
	pub fn finish(&mut self, key: &TileKey) {
		self.running.remove(key);
	}

	/// Remove a queued task. Running tasks are not affected.
	pub fn remove(&mut self, key: &TileKey) -> bool {
		match self.ranks.remove(key) {
			Some(rank) => {
				self.order.remove(&rank);
				true
			}
			None => false,
		}
	}

	/// Remove all queued tasks, most urgent first.
	pub fn drain(&mut self) -> Vec<TileKey> {
		self.ranks.clear();
		let order = std::mem::take(&mut self.order);
		order.into_values().rev().collect()
	}

	pub fn contains(&self, key: &TileKey) -> bool {
		self.ranks.contains_key(key)
	}

	pub fn is_running(&self, key: &TileKey) -> bool {
		self.running.contains(key)
	}

	/// Number of queued tasks, not counting running ones.
	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	pub fn running_len(&self) -> usize {
		self.running.len()
	}
}
