//! Luma: a non-destructive photo editing engine.
//!
//! The base image is never modified by adjustments. Every edit is recorded
//! as an immutable parameter snapshot in [`components::history::EditHistory`],
//! and the visible frame is rebuilt from the base buffer plus the current
//! snapshot by [`canvas::Canvas`]. [`project::Session`] ties these together
//! behind the commands a UI would issue.

#![forbid(unsafe_code)]

pub mod canvas;
pub mod cli;
pub mod components;
pub mod config;
pub mod error;
pub mod logger;
pub mod mask;
pub mod ops;
pub mod params;
pub mod preset;
pub mod project;
pub mod segmentation;

pub use config::EngineConfig;
pub use error::{LumaError, LumaResult, PresetError, SegmentationError};
pub use mask::{Mask, MaskId, MaskKind, RadialGeometry};
pub use params::{CurvePoint, EditParameters, GlobalEdits};
pub use preset::Preset;
pub use project::Session;
pub use segmentation::Segmenter;
