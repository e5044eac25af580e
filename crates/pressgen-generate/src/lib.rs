//! Dependency-ordered synthetic data generation for the publishing platform.
//!
//! The [`GenerationEngine`] resolves the requested tables, optionally clears
//! them and loads a base content pack, then drives one importer per table
//! inside a single storage transaction.

pub mod content_pack;
pub mod engine;
pub mod errors;
pub mod events;
pub mod importer;
pub mod importers;
pub mod model;
pub mod random;
pub mod registry;

pub use content_pack::{BASE_PACK_TABLES, ContentPack};
pub use engine::{GenerationEngine, PROTECTED_ROWS, ProtectedRow};
pub use errors::GenerationError;
pub use events::{EventQueue, EventSpec, Shape, Trend, generate_events};
pub use importer::{
    ByReference, Direct, DirectGenerator, ImportContext, ReferencedGenerator, TableImporter,
};
pub use model::{
    DependencyEntry, DependencyReport, GenerateOptions, GenerationReport, ImportMode, RunOutcome,
    TableReport,
};
pub use random::RunRandom;
pub use registry::{ImporterRegistry, ImporterSpec};
