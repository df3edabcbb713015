//! Engine error type.

use thiserror::Error;

use crate::host::NodeId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("menu content used outside of a live dropdown controller")]
    OutsideController,

    #[error("dropdown already has a trigger bound (node {})", .0.0)]
    TriggerAlreadyBound(NodeId),

    #[error(transparent)]
    Config(#[from] smartdrop_core::Error),

    #[error("replay script: {0}")]
    Script(String),
}

pub type Result<T> = std::result::Result<T, Error>;
