//! assetkit - asset package composition and distribution
//!
//! Exports a package directory as a `.tar.gz` archive that excludes build
//! by-products, and composes several packages into one output package whose
//! build manifest declares the installable inputs as local dependencies.

pub mod bundle;
pub mod compose;
pub mod config;
pub mod install;
pub mod manifest;
pub mod mapping;
pub mod resolve;
pub mod scaffold;

pub use bundle::{extract_archive, ArchiveError, ArchiveListing, Archiver, ExclusionPolicy};
pub use compose::{ComposeError, ComposeLayout, ComposeOptions, Composer, CompositionResult};
pub use config::{ConfigError, EffectiveConfig, Settings};
pub use resolve::{ProjectRoot, ResolveError, Resolver, RootSource};
