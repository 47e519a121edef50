//! Error types for GL resources and texture loading.

use thiserror::Error;

/// Errors raised by GL calls and GPU resource setup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpuError {
    #[error("GL context unavailable: {0}")]
    ContextUnavailable(String),
    #[error("Shader compilation failed: {0}")]
    ShaderCompile(String),
    #[error("Program link failed: {0}")]
    ProgramLink(String),
    #[error("GL resource creation failed: {0}")]
    Resource(String),
    #[error("Attribute `{0}` not found in program")]
    MissingAttribute(&'static str),
}

/// Errors delivered to texture load callers.
///
/// Clone because a coalesced load hands the same result to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextureError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("Failed to decode {url}: {message}")]
    Decode { url: String, message: String },
    #[error("Texture {url} destroyed while loading")]
    Destroyed { url: String },
    #[error("Failed to upload {url}: {message}")]
    Upload { url: String, message: String },
}

impl TextureError {
    pub fn url(&self) -> &str {
        match self {
            Self::Fetch { url, .. }
            | Self::Decode { url, .. }
            | Self::Destroyed { url }
            | Self::Upload { url, .. } => url,
        }
    }
}
