use crate::macrophage::MacrophageState;
use crate::{BacteriumId, GameOutcome, MacrophageId, Vec2};

/// Why a bacterium left the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// Health reached zero.
    Killed,
    /// Expelled by a cough.
    Coughed,
    /// Removed by a kill-all.
    Cleared,
}

/// Things that happened during a step, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    BacteriumSpawned { id: BacteriumId, position: Vec2, cluster_size: usize },
    BacteriumRemoved { id: BacteriumId, cause: RemovalCause },
    FeedingStarted { macrophage: MacrophageId, bacterium: BacteriumId },
    BacteriumEaten { macrophage: MacrophageId, bacterium: BacteriumId },
    MacrophageStateChanged { id: MacrophageId, from: MacrophageState, to: MacrophageState },
    OutcomeReached(GameOutcome),
}
