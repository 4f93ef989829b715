//! Agent model of an alveolar immune response: bacteria that cluster and multiply,
//! macrophages that hunt and eat them, and epithelial cells that signal with chemokine.
//!
//! Everything runs on one simulation clock owned by [`Simulation`]. Agents live in
//! generational arenas and refer to each other only through the handles below.

pub mod bacterium;
pub mod cell;
pub mod chemokine;
pub mod cluster;
pub mod error;
pub mod events;
pub mod macrophage;
pub mod output;
pub mod simulation;
pub mod spatial;
pub mod timer;
pub mod vecmath;

use slotmap::new_key_type;

new_key_type! {
    /// Stable handle for a bacterium.
    pub struct BacteriumId;
    /// Stable handle for a macrophage.
    pub struct MacrophageId;
    /// Stable handle for an epithelial cell.
    pub struct CellId;
    /// Stable handle for a bacteria cluster.
    pub struct ClusterId;
}

pub use bacterium::{Bacterium, MovementState};
pub use cell::Cell;
pub use chemokine::ChemokineWindow;
pub use cluster::ClusterRegistry;
pub use error::SimError;
pub use events::{RemovalCause, SimEvent};
pub use immune_common::{GameOutcome, SimParams, SimulationConfig, Snapshot, Vec2};
pub use macrophage::{Macrophage, MacrophageState, Target};
pub use simulation::Simulation;
pub use spatial::{EntityKind, EntityRef};
