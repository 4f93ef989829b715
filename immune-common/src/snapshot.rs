use serde::{Serialize, Deserialize};

/// Terminal state of a run. Once `Won` or `Lost` is reached it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    #[default]
    Running,
    Won,
    Lost,
}

/// A snapshot of the simulation state and metrics at a specific time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// The simulation time at which the snapshot was taken.
    pub time: f32,
    pub bacteria_count: u32,
    pub sessile_count: u32,
    pub flowing_count: u32,
    pub macrophage_count: u32,
    /// Macrophages per state, ordered Idle, ChemokineFound, BacteriaInRange.
    pub macrophage_states: [u32; 3],
    pub cluster_count: u32,
    pub largest_cluster: u32,
    /// Mean number of other bacteria inside the density radius.
    pub mean_density_neighbors: f32,
    pub bacteria_eaten: u32,
    /// Mean normalized chemokine level (0-100) over all cells.
    pub mean_chemokine_level: f32,
    pub retries_left: u32,
    pub outcome: GameOutcome,
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "positions": null
    pub positions: Option<Vec<(f32, f32)>>,
}
