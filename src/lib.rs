//! Field audit and booking-fact inference over jail-booking document samples.
//!
//! The pipeline is sequential and per-document: flatten each document into
//! field paths, fold the paths into running statistics, classify fields as
//! categorical or not, and derive the canonical booking timestamp and bond
//! amount used for the recent-booking windows. A field-map diff compares
//! source collections against their normalized counterparts.

pub mod audit;
pub mod classify;
pub mod coerce;
pub mod config;
pub mod data;
pub mod derive;
pub mod error;
pub mod fieldmap;
pub mod flatten;
pub mod profile;
pub mod stats;
pub mod summary;
pub mod window;

use std::{env, sync::OnceLock};

use log::LevelFilter;

pub use audit::{CollectionAudit, CollectionReport, group_windows};
pub use classify::{CategoricalClassifier, CategoricalVerdict, ClassifierConfig, Reason};
pub use config::AuditConfig;
pub use data::{Document, Value, ValueKind, parse_document, read_samples};
pub use derive::{DerivationCoverage, DerivedFact, FactDeriver};
pub use error::AuditError;
pub use fieldmap::{CollectionPair, FieldMapDiff, SchemaMapper, parse_pairs};
pub use flatten::{FlatDocument, FlattenConfig, flatten};
pub use profile::{ProfileTable, SourceSchemaProfile};
pub use stats::{DateRange, FieldStatistics, FieldStatsAggregator, NumericSummary};
pub use summary::{FieldProfile, FieldProfileConfig, FieldProfiler};
pub use window::{GroupedWindows, Window, WindowBucketizer, WindowTable};

static LOGGER: OnceLock<()> = OnceLock::new();

/// Installs the `env_logger` backend once. `RUST_LOG` wins when set;
/// otherwise this crate logs at info.
pub fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("booking_audit", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}
