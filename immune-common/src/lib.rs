pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    BacteriaConfig, CellsConfig, FloorConfig, GameConfig, InitialConditions, MacrophageConfig,
    ModelParameter, OutputConfig, ScenarioAction, ScenarioStep, SimulationConfig, TimingConfig,
    WindowScope,
};
pub use sim_params::SimParams;
pub use snapshot::{GameOutcome, Snapshot};
pub use vecmath::{Vec2, angle_to_vec, clamp};
