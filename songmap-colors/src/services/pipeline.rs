//! Country color enrichment pipeline
//!
//! Fan-out/fan-in over the country catalog:
//! 1. Serve the cached map if it is still fresh.
//! 2. Otherwise enumerate the catalog and spawn one task per entry. Entries
//!    are scheduled in batches, but every task from every batch competes for
//!    the same [`AdmissionController`], so batches never serialize.
//! 3. Each task holds an admission slot for the duration of its song fetch,
//!    derives a color (or the fallback), then records the result and reports
//!    progress.
//! 4. Join all tasks, fill any gap with the fallback color, cache the map.
//!
//! A single country's failure never aborts the run. Only a catalog failure
//! degrades the result, to an empty map.

use crate::services::admission::{AdmissionController, DEFAULT_PERMITS};
use crate::services::color_hasher::{color_for, FALLBACK_COLOR};
use crate::services::country_catalog::CountryCatalog;
use crate::services::itunes_client::{FetchError, SongSource, DEFAULT_SONG_LIMIT};
use crate::services::result_cache::ResultCache;
use crate::types::{ColorMap, CountryEntry};
use serde::Serialize;
use songmap_common::{Error, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default scheduling batch size
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Default per-fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(3000);

/// Progress callback, invoked with percentages `0..=100`
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Concurrent fetch slots
    pub permits: usize,
    /// Entries per scheduling batch
    pub batch_size: usize,
    /// Ranked titles fetched per country
    pub song_limit: usize,
    /// Upper bound on a single song fetch
    pub fetch_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            permits: DEFAULT_PERMITS,
            batch_size: DEFAULT_BATCH_SIZE,
            song_limit: DEFAULT_SONG_LIMIT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.permits == 0 {
            return Err(Error::Config("pipeline permits must be > 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("pipeline batch_size must be > 0".to_string()));
        }
        if self.song_limit == 0 {
            return Err(Error::Config("pipeline song_limit must be > 0".to_string()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(Error::Config("pipeline fetch_timeout must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Catalog entries processed (duplicates included)
    pub total_entries: usize,
    /// Countries colored from song data
    pub colored: usize,
    /// Countries assigned the fallback color
    pub fallbacks: usize,
    /// Entries skipped because their ISO code was already claimed
    pub duplicates: usize,
    pub from_cache: bool,
    pub catalog_failed: bool,
    pub elapsed_ms: u64,
}

/// What happened to one catalog entry
#[derive(Debug)]
enum EntryOutcome {
    Colored(String),
    Fallback,
    Duplicate,
}

/// Aggregate state shared by the entry tasks of one run
///
/// Guarded by a single mutex that is never held across an await.
#[derive(Default)]
struct RunState {
    colors: ColorMap,
    claimed: HashSet<String>,
    processed: usize,
    last_reported: Option<u8>,
    colored: usize,
    fallbacks: usize,
    duplicates: usize,
}

struct RunContext {
    songs: Arc<dyn SongSource>,
    admission: AdmissionController,
    song_limit: usize,
    fetch_timeout: Duration,
    total: usize,
    state: Mutex<RunState>,
    on_progress: ProgressFn,
}

impl RunContext {
    fn lock(&self) -> std::sync::MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// First entry to claim an ISO code does the work
    fn claim(&self, iso_code: &str) -> bool {
        self.lock().claimed.insert(iso_code.to_string())
    }

    /// Record an outcome, bump the processed counter and report progress
    ///
    /// The callback runs under the state lock so reported values reach the
    /// caller in non-decreasing order.
    fn record(&self, iso_code: &str, outcome: EntryOutcome) {
        let mut state = self.lock();

        match outcome {
            EntryOutcome::Colored(color) => {
                state.colors.insert(iso_code.to_string(), color);
                state.colored += 1;
            }
            EntryOutcome::Fallback => {
                state.colors.insert(iso_code.to_string(), FALLBACK_COLOR.to_string());
                state.fallbacks += 1;
            }
            EntryOutcome::Duplicate => {
                state.duplicates += 1;
            }
        }

        state.processed += 1;
        let percent = progress_percent(state.processed, self.total);
        self.report_locked(&mut state, percent);
    }

    fn report_locked(&self, state: &mut RunState, percent: u8) {
        if state.last_reported.map_or(true, |last| percent >= last) {
            state.last_reported = Some(percent);
            (self.on_progress)(percent);
        }
    }

    /// Fetch titles under the per-fetch timeout and derive a color
    async fn color_entry(&self, iso_code: &str) -> EntryOutcome {
        let fetch = self.songs.fetch_top_titles(iso_code, self.song_limit);
        let result = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout)),
        };

        match result {
            Ok(titles) if titles.is_empty() => {
                debug!(iso_code = %iso_code, "No songs returned, using fallback color");
                EntryOutcome::Fallback
            }
            Ok(titles) => match color_for(&titles) {
                Ok(color) => {
                    debug!(iso_code = %iso_code, titles = titles.len(), color = %color, "Derived color");
                    EntryOutcome::Colored(color)
                }
                Err(e) => {
                    warn!(iso_code = %iso_code, "Color derivation failed: {}", e);
                    EntryOutcome::Fallback
                }
            },
            Err(e) => {
                warn!(iso_code = %iso_code, "Song fetch failed, using fallback color: {}", e);
                EntryOutcome::Fallback
            }
        }
    }
}

/// One entry task: admission slot → dedupe → fetch → color → record
async fn process_entry(ctx: Arc<RunContext>, iso_code: String) {
    let outcome = match ctx.admission.acquire().await {
        Ok(_permit) => {
            if ctx.claim(&iso_code) {
                ctx.color_entry(&iso_code).await
            } else {
                debug!(iso_code = %iso_code, "Duplicate ISO code, skipping");
                EntryOutcome::Duplicate
            }
        }
        Err(e) => {
            warn!(iso_code = %iso_code, "Admission failed: {}", e);
            EntryOutcome::Fallback
        }
    };

    ctx.record(&iso_code, outcome);
}

fn progress_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Orchestrates cache, catalog, song source and hasher
pub struct EnrichmentPipeline {
    catalog: Arc<dyn CountryCatalog>,
    songs: Arc<dyn SongSource>,
    cache: ResultCache,
    admission: AdmissionController,
    config: PipelineConfig,
}

impl EnrichmentPipeline {
    pub fn new(
        catalog: Arc<dyn CountryCatalog>,
        songs: Arc<dyn SongSource>,
        cache: ResultCache,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let admission = AdmissionController::new(config.permits)?;

        Ok(Self {
            catalog,
            songs,
            cache,
            admission,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn song_source(&self) -> &Arc<dyn SongSource> {
        &self.songs
    }

    /// Compute (or load) the color of every catalog country
    ///
    /// Never fails: per-country errors become the fallback color and a
    /// catalog error yields an empty map.
    pub async fn process_country_colors<F>(&self, on_progress: F) -> ColorMap
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.run(Arc::new(on_progress)).await.0
    }

    /// Like [`process_country_colors`](Self::process_country_colors), also
    /// returning a run summary
    pub async fn run(&self, on_progress: ProgressFn) -> (ColorMap, PipelineReport) {
        let started = Instant::now();

        if let Some(record) = self.cache.get().await {
            info!(countries = record.colors.len(), "Serving country colors from cache");
            on_progress(100);
            let report = PipelineReport {
                total_entries: record.colors.len(),
                from_cache: true,
                elapsed_ms: started.elapsed().as_millis() as u64,
                ..Default::default()
            };
            return (record.colors, report);
        }

        let entries = match self.catalog.list_countries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Country catalog unavailable, returning no colors: {}", e);
                let report = PipelineReport {
                    catalog_failed: true,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    ..Default::default()
                };
                return (ColorMap::new(), report);
            }
        };

        let (colors, mut report) = self.color_entries(entries, on_progress).await;
        self.cache.put(&colors).await;

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            total = report.total_entries,
            colored = report.colored,
            fallbacks = report.fallbacks,
            duplicates = report.duplicates,
            elapsed_ms = report.elapsed_ms,
            "Country color run complete"
        );

        (colors, report)
    }

    async fn color_entries(
        &self,
        entries: Vec<CountryEntry>,
        on_progress: ProgressFn,
    ) -> (ColorMap, PipelineReport) {
        let iso_codes: Vec<String> = entries
            .into_iter()
            .map(|entry| entry.iso_code.trim().to_uppercase())
            .collect();

        info!(
            entries = iso_codes.len(),
            permits = self.admission.capacity(),
            batch_size = self.config.batch_size,
            "Computing country colors"
        );

        let ctx = Arc::new(RunContext {
            songs: Arc::clone(&self.songs),
            admission: self.admission.clone(),
            song_limit: self.config.song_limit,
            fetch_timeout: self.config.fetch_timeout,
            total: iso_codes.len(),
            state: Mutex::new(RunState::default()),
            on_progress,
        });

        let mut tasks = JoinSet::new();
        for (batch_index, batch) in iso_codes.chunks(self.config.batch_size).enumerate() {
            debug!(batch = batch_index, size = batch.len(), "Scheduling batch");
            for iso_code in batch {
                tasks.spawn(process_entry(Arc::clone(&ctx), iso_code.clone()));
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Entry task did not complete: {}", e);
            }
        }

        let mut state = ctx.lock();

        // A task that died before recording leaves a gap
        for iso_code in &iso_codes {
            if !state.colors.contains_key(iso_code) {
                warn!(iso_code = %iso_code, "No result recorded, using fallback color");
                state
                    .colors
                    .insert(iso_code.clone(), FALLBACK_COLOR.to_string());
                state.fallbacks += 1;
            }
        }

        if state.last_reported != Some(100) {
            ctx.report_locked(&mut state, 100);
        }

        let report = PipelineReport {
            total_entries: iso_codes.len(),
            colored: state.colored,
            fallbacks: state.fallbacks,
            duplicates: state.duplicates,
            ..Default::default()
        };

        (std::mem::take(&mut state.colors), report)
    }
}
