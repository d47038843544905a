//! Service components of the color enrichment pipeline
//!
//! Leaf-first: admission control, color hashing, result cache, country
//! catalog and song source, then the pipeline that orchestrates them.

pub mod admission;
pub mod color_hasher;
pub mod country_catalog;
pub mod itunes_client;
pub mod pipeline;
pub mod result_cache;

pub use admission::{AdmissionController, AdmissionError, AdmissionPermit};
pub use color_hasher::{color_for, HashInputError, FALLBACK_COLOR};
pub use country_catalog::{CatalogError, CountryCatalog, GeoJsonCatalog, StaticCatalog};
pub use itunes_client::{FetchError, ItunesClient, SongSource};
pub use pipeline::{EnrichmentPipeline, PipelineConfig, PipelineReport, ProgressFn};
pub use result_cache::{CacheError, CacheStore, MemoryCacheStore, ResultCache};
