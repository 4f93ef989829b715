use crate::{BacteriumId, CellId, MacrophageId};
use thiserror::Error;

/// Errors returned by simulation operations that address a specific entity.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error("bacterium {0:?} is not alive")]
    UnknownBacterium(BacteriumId),
    #[error("macrophage {0:?} does not exist")]
    UnknownMacrophage(MacrophageId),
    #[error("cell {0:?} does not exist")]
    UnknownCell(CellId),
    /// Indicates configuration values the simulation cannot run with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
