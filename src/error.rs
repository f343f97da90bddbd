// src/error.rs
//
// Unified error handling for stream-resizer
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid arguments or missing sources, recoverable
// - CodecError: Decode/composite failures
// - ResourceLimit: Dimension limits and I/O pressure
// - InternalBug: Panics and closed contexts (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used to classify failures delivered through callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by the caller
    UserError,
    /// Source could not be decoded or drawn
    CodecError,
    /// Dimension/pixel limits or I/O resource problems
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }
}

/// stream-resizer error types
#[derive(Debug, Error)]
pub enum ResizeError {
    // Argument Errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Invalid target dimensions: width={width}, height={height}")]
    InvalidDimensions { width: u32, height: u32 },

    // File I/O Errors
    #[error("File not found: {path}")]
    FileNotFound { path: Cow<'static, str> },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Decode Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Decoded image has an empty dimension ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Composite Errors
    #[error("Composite failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    CompositeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    // Task Errors
    /// Cooperative early exit of a cancelled task. Never delivered to a callback.
    #[error("Task was cancelled")]
    Cancelled,

    #[error("Execution context is closed: {context}")]
    ContextClosed { context: Cow<'static, str> },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },

    #[error("{message}")]
    Generic { message: Cow<'static, str> },
}

impl Clone for ResizeError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::InvalidDimensions { width, height } => Self::InvalidDimensions {
                width: *width,
                height: *height,
            },
            Self::FileNotFound { path } => Self::FileNotFound { path: path.clone() },
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::UnsupportedFormat { format } => Self::UnsupportedFormat {
                format: format.clone(),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::EmptyImage { width, height } => Self::EmptyImage {
                width: *width,
                height: *height,
            },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::CompositeFailed {
                source_width,
                source_height,
                target_width,
                target_height,
                message,
            } => Self::CompositeFailed {
                source_width: *source_width,
                source_height: *source_height,
                target_width: *target_width,
                target_height: *target_height,
                message: message.clone(),
            },
            Self::Cancelled => Self::Cancelled,
            Self::ContextClosed { context } => Self::ContextClosed {
                context: context.clone(),
            },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
            Self::Generic { message } => Self::Generic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl ResizeError {
    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidDimensions { width, height }
    }

    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn empty_image(width: u32, height: u32) -> Self {
        Self::EmptyImage { width, height }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn composite_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::CompositeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    pub fn context_closed(context: impl Into<Cow<'static, str>>) -> Self {
        Self::ContextClosed {
            context: context.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (caller can fix it and re-submit)
    ///
    /// Consistent with category():
    /// - UserError and ResourceLimit errors are recoverable
    /// - CodecError and InternalBug errors are not
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// True for the internal cancellation marker
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument { .. }
            | Self::InvalidDimensions { .. }
            | Self::FileNotFound { .. }
            | Self::Cancelled => ErrorCategory::UserError,

            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::EmptyImage { .. }
            | Self::CompositeFailed { .. } => ErrorCategory::CodecError,

            // FileReadFailed usually means permissions, locks or a full disk rather than
            // bad image data, so it sits with the resource errors.
            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::FileReadFailed { .. } => ErrorCategory::ResourceLimit,

            Self::ContextClosed { .. } | Self::InternalPanic { .. } | Self::Generic { .. } => {
                ErrorCategory::InternalBug
            }
        }
    }
}

impl From<image::ImageError> for ResizeError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => ResizeError::unsupported_format(e.to_string()),
            image::ImageError::Limits(e) => ResizeError::decode_failed(format!("limits: {e}")),
            other => ResizeError::decode_failed(other.to_string()),
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, ResizeError>;
