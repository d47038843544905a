//! Test doubles shared by the songmap-colors integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use songmap_colors::services::{
    CatalogError, CountryCatalog, EnrichmentPipeline, FetchError, MemoryCacheStore,
    PipelineConfig, ResultCache, SongSource, StaticCatalog,
};
use songmap_colors::types::Song;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake source answers for one ISO code
#[derive(Debug, Clone)]
pub enum Reply {
    Titles(Vec<&'static str>),
    Fail,
    Empty,
    Panic,
    Hang,
}

/// Scripted song source that records how it was called
pub struct FakeSongSource {
    replies: HashMap<String, Reply>,
    delay: Duration,
    calls: AtomicUsize,
    current: AtomicUsize,
    peak: AtomicUsize,
    /// ("start" | "end", iso_code) in the order they happened
    events: Mutex<Vec<(&'static str, String)>>,
}

impl FakeSongSource {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(mut self, iso_code: &str, reply: Reply) -> Self {
        self.replies.insert(iso_code.to_string(), reply);
        self
    }

    /// Time each fetch spends "on the network"
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<(&'static str, String)> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, kind: &'static str, iso_code: &str) {
        self.events.lock().unwrap().push((kind, iso_code.to_string()));
    }
}

/// Decrements the in-flight counter however the fetch exits
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SongSource for FakeSongSource {
    async fn fetch_top_songs(&self, iso_code: &str, limit: usize) -> Result<Vec<Song>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.current);
        self.record("start", iso_code);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self
            .replies
            .get(iso_code)
            .cloned()
            .unwrap_or(Reply::Titles(vec!["Default Song"]));

        let result = match reply {
            Reply::Titles(titles) => Ok(titles
                .into_iter()
                .take(limit)
                .map(|title| Song {
                    title: title.to_string(),
                    artist: "Test Artist".to_string(),
                    artwork: String::new(),
                    preview_url: None,
                })
                .collect()),
            Reply::Fail => Err(FetchError::Status(503)),
            Reply::Empty => Ok(Vec::new()),
            Reply::Panic => panic!("song source exploded for {}", iso_code),
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        self.record("end", iso_code);
        result
    }
}

/// Catalog that always fails
pub struct BrokenCatalog;

#[async_trait]
impl CountryCatalog for BrokenCatalog {
    async fn list_countries(&self) -> Result<Vec<songmap_colors::types::CountryEntry>, CatalogError> {
        Err(CatalogError::Unavailable("dataset offline".to_string()))
    }
}

/// Catalog of `(name, code)` pairs
pub fn catalog(pairs: &[(&'static str, &'static str)]) -> Arc<StaticCatalog> {
    Arc::new(StaticCatalog::from_pairs(pairs.iter().copied()))
}

/// Pipeline over an in-memory cache
pub fn pipeline(
    catalog: Arc<dyn CountryCatalog>,
    songs: Arc<dyn SongSource>,
    config: PipelineConfig,
) -> EnrichmentPipeline {
    let cache = ResultCache::new(Arc::new(MemoryCacheStore::new()));
    EnrichmentPipeline::new(catalog, songs, cache, config).unwrap()
}

/// Progress values seen during a run
#[derive(Clone, Default)]
pub struct ProgressLog(Arc<Mutex<Vec<u8>>>);

impl ProgressLog {
    pub fn callback(&self) -> impl Fn(u8) + Send + Sync + 'static {
        let log = Arc::clone(&self.0);
        move |percent| log.lock().unwrap().push(percent)
    }

    pub fn values(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}
