use serde::{Deserialize, Serialize};
use crate::config::WindowScope;

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Floor (centred on the origin)
    pub half_width: f32,
    pub half_height: f32,

    // Time
    pub dt: f32,

    // Bacteria
    pub bacteria_default_health: i32,
    pub flowing_step: f32,
    pub sessile_step: f32,
    pub probability_interchanged: f32,
    pub bacteria_motile: bool,
    pub density_radius: f32, // Neighbours inside this radius raise the health multiplier
    pub density_bonus: f32,
    pub cluster_radius: f32, // Proximity-graph edge length
    pub bacteria_heading_interval: f32,
    pub reproduction_tick: f32,
    pub reproduction_base: u32,
    pub reproduction_cluster_penalty: u32,
    pub reproduction_floor: u32,
    pub offspring_offset: f32,

    // Macrophages
    pub macrophage_damage: i32,
    pub macrophage_speed: f32,
    pub sensing_radius: f32,
    pub chemokine_scan_radius: f32,
    pub macrophage_contact_radius: f32,
    pub feeding_distance: f32,
    pub feeding_interval: f32,
    pub stale_target_distance: f32,
    pub idle_heading_interval: f32,
    pub agitated_heading_interval: f32,
    pub pursuit_multiplier: f32,

    // Cells
    pub cell_contact_radius: f32,
    pub chemokine_sensitivity: Option<f32>, // None disables sensing (reads as 0)
    pub window_threshold: u32,
    pub window_scope: WindowScope,
    pub secretion_per_bacterium: f32,
    pub chemokine_decay_rate: f32,

    // Game
    pub win_population: u32,
    pub loss_retries_below: u32,
    pub cough_probability: f32,
}

impl SimParams {
    /// Number of reproduction ticks a bacterium in a cluster of `cluster_size` waits before
    /// doubling: `min(floor + size^2 * penalty, base)`. Larger clusters double more slowly;
    /// the wait never drops below `reproduction_floor` nor exceeds `reproduction_base`.
    pub fn doubling_threshold(&self, cluster_size: usize) -> u32 {
        let size = cluster_size as u64;
        let penalty = size.saturating_mul(size).saturating_mul(self.reproduction_cluster_penalty as u64);
        let wait = (self.reproduction_floor as u64).saturating_add(penalty);
        wait.min(self.reproduction_base.max(self.reproduction_floor) as u64) as u32
    }
}
