use thiserror::Error;

/// Why a preset document was rejected. The session is left untouched.
#[derive(Debug, Error)]
pub enum PresetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("preset is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported preset version {found} (newest known is {supported})")]
    Version { found: u32, supported: u32 },
    #[error("invalid preset: {0}")]
    Shape(String),
}

/// Failures of the external subject-segmentation collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentationError {
    #[error("segmentation model unavailable: {0}")]
    Unavailable(String),
    #[error("no subject found")]
    NoSubject,
    #[error("segmentation returned {got} values for a {expected}-pixel image")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("segmentation job panicked: {0}")]
    Panicked(String),
    #[error("segmentation job was dropped before it answered")]
    Disconnected,
}

/// Umbrella error for file-facing paths (CLI, config, image IO).
#[derive(Debug, Error)]
pub enum LumaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Preset(#[from] PresetError),
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
    #[error("no image loaded")]
    NoImage,
}

pub type LumaResult<T> = Result<T, LumaError>;
