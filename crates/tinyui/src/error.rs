//! Engine errors.

use gpu::{GpuError, TextureError};
use scene::SceneError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error("engine has been destroyed")]
    Destroyed,

    #[error("invalid node: {0}")]
    InvalidNode(#[from] SceneError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
