use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};
use tilecascade::{ProviderSettings, ProviderSpec, TileEngine, TileLoader};
use tilecascade_core::{SystemicFailure, TileImage, TileKey, TileSourceDescriptor};
use tokio::{
	runtime::Handle,
	sync::{Semaphore, mpsc},
	time::{sleep, timeout},
};

type Journal = Arc<Mutex<Vec<(String, TileKey)>>>;

#[derive(Debug, Clone)]
enum Step {
	Tile([u8; 4]),
	Expired([u8; 4]),
	Fail,
	Systemic(SystemicFailure),
}

/// Loader with a fixed answer per tile. Unknown tiles are not found.
#[derive(Debug)]
struct ScriptedLoader {
	name: String,
	steps: HashMap<TileKey, Step>,
	journal: Journal,
	gate: Option<Arc<Semaphore>>,
}

impl ScriptedLoader {
	fn new(name: &str, journal: &Journal) -> Self {
		ScriptedLoader {
			name: name.to_string(),
			steps: HashMap::new(),
			journal: journal.clone(),
			gate: None,
		}
	}

	fn step(mut self, key: TileKey, step: Step) -> Self {
		self.steps.insert(key, step);
		self
	}

	fn gated(mut self, gate: &Arc<Semaphore>) -> Self {
		self.gate = Some(gate.clone());
		self
	}

	fn spec(self, workers: usize, queue_capacity: usize) -> ProviderSpec {
		ProviderSpec::new(Arc::new(self), ProviderSettings::new(workers, queue_capacity))
	}
}

#[async_trait]
impl TileLoader for ScriptedLoader {
	fn name(&self) -> &str {
		&self.name
	}

	async fn load_tile(&self, key: &TileKey) -> Result<Option<TileImage>> {
		self.journal.lock().push((self.name.clone(), *key));
		if let Some(gate) = &self.gate {
			gate.acquire().await?.forget();
		}
		match self.steps.get(key) {
			None => Ok(None),
			Some(Step::Tile(rgba)) => Ok(Some(TileImage::filled(1, *rgba))),
			Some(Step::Expired(rgba)) => Ok(Some(TileImage::filled(1, *rgba).into_expired())),
			Some(Step::Fail) => bail!("broken tile {key}"),
			Some(Step::Systemic(failure)) => Err(anyhow::Error::new(failure.clone())),
		}
	}
}

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn key(column: u32, row: u32) -> TileKey {
	TileKey::new(12, column, row).unwrap()
}

fn engine(capacity: usize, providers: Vec<ProviderSpec>) -> TileEngine {
	TileEngine::builder(Handle::current())
		.cache_capacity(capacity)
		.systemic_backoff(Duration::from_secs(60))
		.source(TileSourceDescriptor::new("Test", 0, 18, 1, ".png", &[]), providers)
		.build()
		.unwrap()
}

fn colour(image: &TileImage) -> [u8; 4] {
	image.with_pixels(|p| p.get_pixel(0, 0).0).unwrap()
}

fn attempts(journal: &Journal, name: &str) -> usize {
	journal.lock().iter().filter(|(n, _)| n == name).count()
}

async fn wait_until(condition: impl Fn() -> bool) {
	timeout(Duration::from_secs(10), async {
		while !condition() {
			sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_attempt() {
	let journal = Journal::default();
	let gate = Arc::new(Semaphore::new(0));
	let engine = engine(
		10,
		vec![
			ScriptedLoader::new("local", &journal)
				.step(key(1, 1), Step::Tile(RED))
				.gated(&gate)
				.spec(4, 10),
		],
	);

	let (sender, mut receiver) = mpsc::unbounded_channel();
	for _ in 0..20 {
		let sender = sender.clone();
		engine.request(key(1, 1), "Test", move |key, image| sender.send((key, image)).unwrap());
	}
	assert_eq!(engine.in_flight_len("Test"), 1);
	gate.add_permits(100);

	let mut results = Vec::new();
	for _ in 0..20 {
		results.push(receiver.recv().await.unwrap());
	}
	let (_, first) = &results[0];
	let first = first.clone().unwrap();
	for (key, image) in &results {
		assert_eq!(*key, self::key(1, 1));
		assert!(image.as_ref().unwrap().ptr_eq(&first));
	}
	assert_eq!(attempts(&journal, "local"), 1);
	assert_eq!(engine.in_flight_len("Test"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn providers_are_tried_in_order() {
	let journal = Journal::default();
	let engine = engine(
		10,
		vec![
			ScriptedLoader::new("filesystem", &journal)
				.step(key(0, 0), Step::Tile(RED))
				.spec(2, 10),
			ScriptedLoader::new("archive", &journal)
				.step(key(1, 0), Step::Fail)
				.spec(2, 10),
			ScriptedLoader::new("network", &journal)
				.step(key(0, 0), Step::Tile(BLUE))
				.step(key(1, 0), Step::Tile(GREEN))
				.spec(2, 10),
		],
	);

	let image = engine.resolve(key(1, 0), "Test").await.unwrap();
	assert_eq!(colour(&image), GREEN);
	assert_eq!(
		*journal.lock(),
		vec![
			("filesystem".to_string(), key(1, 0)),
			("archive".to_string(), key(1, 0)),
			("network".to_string(), key(1, 0)),
		]
	);

	journal.lock().clear();
	let image = engine.resolve(key(0, 0), "Test").await.unwrap();
	assert_eq!(colour(&image), RED);
	assert_eq!(attempts(&journal, "network"), 0);

	// nobody has it
	assert!(engine.resolve(key(5, 5), "Test").await.is_none());
	assert_eq!(attempts(&journal, "network"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn expired_tiles_are_the_fallback() {
	let journal = Journal::default();
	let engine = engine(
		10,
		vec![
			ScriptedLoader::new("filesystem", &journal)
				.step(key(0, 0), Step::Expired(RED))
				.step(key(0, 1), Step::Expired(RED))
				.spec(2, 10),
			ScriptedLoader::new("network", &journal)
				.step(key(0, 0), Step::Tile(GREEN))
				.step(key(0, 1), Step::Fail)
				.spec(2, 10),
		],
	);

	let fresh = engine.resolve(key(0, 0), "Test").await.unwrap();
	assert_eq!(colour(&fresh), GREEN);
	assert!(!fresh.is_expired());

	let outdated = engine.resolve(key(0, 1), "Test").await.unwrap();
	assert_eq!(colour(&outdated), RED);
	assert!(outdated.is_expired());

	// an expired cache hit is served only after the providers had another go
	journal.lock().clear();
	let again = engine.resolve(key(0, 1), "Test").await.unwrap();
	assert!(again.is_expired());
	assert_eq!(attempts(&journal, "filesystem"), 1);
	assert_eq!(attempts(&journal, "network"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_requests_keep_their_result_silently() {
	let journal = Journal::default();
	let gate = Arc::new(Semaphore::new(0));
	let engine = engine(
		10,
		vec![
			ScriptedLoader::new("network", &journal)
				.step(key(2, 2), Step::Tile(RED))
				.step(key(3, 3), Step::Tile(GREEN))
				.gated(&gate)
				.spec(1, 10),
		],
	);

	let called = Arc::new(AtomicBool::new(false));
	for key in [key(2, 2), key(3, 3)] {
		let called = called.clone();
		engine.request(key, "Test", move |_, _| called.store(true, Ordering::SeqCst));
	}
	wait_until(|| attempts(&journal, "network") == 1).await;

	// one is running, the other one is still queued
	assert!(engine.cancel(&key(2, 2), "Test"));
	assert!(engine.cancel(&key(3, 3), "Test"));
	assert!(!engine.cancel(&key(3, 3), "Test"));
	gate.add_permits(10);

	let running = journal.lock()[0].1;
	wait_until(|| engine.cached(&running, "Test").is_some()).await;
	sleep(Duration::from_millis(50)).await;
	assert!(!called.load(Ordering::SeqCst));
	assert_eq!(attempts(&journal, "network"), 1);
	assert_eq!(engine.in_flight_len("Test"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn systemic_failure_moves_queued_tiles_on() {
	let journal = Journal::default();
	let gate = Arc::new(Semaphore::new(0));
	let mut unreachable = ScriptedLoader::new("network", &journal)
		.step(key(9, 9), Step::Systemic(SystemicFailure::Unreachable("tiles.test".into())))
		.gated(&gate);
	let mut archive = ScriptedLoader::new("archive", &journal);
	for row in 0..6 {
		unreachable = unreachable.step(key(0, row), Step::Tile(RED));
		archive = archive.step(key(0, row), Step::Tile(BLUE));
	}
	let engine = engine(20, vec![unreachable.spec(1, 20), archive.spec(2, 20)]);

	let (sender, mut receiver) = mpsc::unbounded_channel();
	let request = |key: TileKey| {
		let sender = sender.clone();
		engine.request(key, "Test", move |key, image| sender.send((key, image)).unwrap());
	};
	request(key(9, 9));
	wait_until(|| attempts(&journal, "network") == 1).await;
	for row in 0..6 {
		request(key(0, row));
	}
	gate.add_permits(100);

	let mut results = HashMap::new();
	for _ in 0..7 {
		let (key, image) = receiver.recv().await.unwrap();
		results.insert(key, image);
	}
	assert!(results[&key(9, 9)].is_none());
	for row in 0..6 {
		assert_eq!(colour(results[&key(0, row)].as_ref().unwrap()), BLUE);
	}
	// the queued tiles were never attempted by the failing provider
	assert_eq!(attempts(&journal, "network"), 1);
	assert!(engine.is_suspended("Test"));

	// while suspended, new requests skip the provider
	let image = engine.resolve(key(0, 7), "Test").await;
	assert!(image.is_none());
	assert_eq!(attempts(&journal, "network"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queue_overflow_completes_the_oldest_request() {
	let journal = Journal::default();
	let gate = Arc::new(Semaphore::new(0));
	let mut loader = ScriptedLoader::new("network", &journal).gated(&gate);
	for column in 0..3 {
		loader = loader.step(key(column, 0), Step::Tile(GREEN));
	}
	let engine = engine(10, vec![loader.spec(1, 1)]);

	let (sender, mut receiver) = mpsc::unbounded_channel();
	let request = |key: TileKey| {
		let sender = sender.clone();
		engine.request(key, "Test", move |key, image| sender.send((key, image)).unwrap());
	};
	request(key(0, 0));
	wait_until(|| attempts(&journal, "network") == 1).await;
	request(key(1, 0));
	request(key(2, 0));

	// key 1 scrolled away in favour of key 2
	let (dropped, image) = receiver.recv().await.unwrap();
	assert_eq!(dropped, key(1, 0));
	assert!(image.is_none());

	gate.add_permits(10);
	let mut rest = vec![receiver.recv().await.unwrap().0, receiver.recv().await.unwrap().0];
	rest.sort();
	assert_eq!(rest, vec![key(0, 0), key(2, 0)]);
	assert_eq!(attempts(&journal, "network"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn out_of_memory_releases_cached_tiles() {
	let journal = Journal::default();
	let engine = engine(
		10,
		vec![
			ScriptedLoader::new("archive", &journal)
				.step(
					key(7, 7),
					Step::Systemic(SystemicFailure::OutOfMemory("decoder limits".into())),
				)
				.spec(1, 10),
		],
	);
	let cache = engine.cache("Test").unwrap();
	let images: Vec<TileImage> = (0..8).map(|_| TileImage::filled(4, RED)).collect();
	for (row, image) in images.iter().enumerate() {
		cache.put(key(0, row as u32), image.clone());
	}

	assert!(engine.resolve(key(7, 7), "Test").await.is_none());
	assert_eq!(cache.len(), 4);
	assert_eq!(images.iter().filter(|image| image.is_recycled()).count(), 4);
}
