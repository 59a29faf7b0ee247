use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

/// Everything that can go wrong while loading, filtering or writing a cloud.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A stage parameter is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Cropping is only possible as part of loading.
    #[error("cannot crop a point cloud that was already loaded without a boundary")]
    CropAfterLoad,

    /// Stages must run in the fixed order sample, filter, smooth.
    #[error("cannot run {stage} after {after}")]
    StageOrder {
        stage: &'static str,
        after: &'static str,
    },

    /// Surface smoothing needs per-point normals.
    #[error("surface smoothing requires normals, but the point cloud has none")]
    MissingNormals,

    #[error("unsupported point cloud data in {path}: {details}")]
    Format { path: PathBuf, details: String },

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FilterError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn format(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Whether the pipeline may skip the failing stage and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingNormals)
    }
}

/// Reject radii that are zero, negative or not finite.
pub fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FilterError::invalid(
            name,
            format!("must be a finite value greater than 0, got {value}"),
        ))
    }
}
