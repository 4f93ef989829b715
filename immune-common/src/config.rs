use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::SimParams;
use std::path::Path;

// Size of the floor all agents live on. The floor is centred on the origin.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FloorConfig {
    pub width: f32,
    pub height: f32,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub dt: f32,
    pub total_time: f32,
    pub record_interval: f32,
}

/// The tunable model parameters shared by every agent.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelParameter {
    pub bacteria_default_health: i32,
    pub movement_in_flowing_phase: f32,
    pub movement_in_sessile_phase: f32,
    /// A bacterium flips phase when a uniform draw exceeds this value.
    pub probability_interchanged: f32,
    pub macrophage_damage: i32,
    pub macrophage_movement: f32,
    pub sensitivity_to_feel_cytokine_gradient: f32,
    #[serde(default = "default_number_of_bacteria")]
    pub number_of_bacteria: u32,
    pub number_of_macrophages: u32,
}

// Bacterium behaviour constants
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BacteriaConfig {
    /// Whether heading-based translation is applied. Phase interchange runs regardless.
    #[serde(default)]
    pub motile: bool,
    #[serde(default = "default_density_radius")]
    pub density_radius: f32,
    #[serde(default = "default_density_bonus")]
    pub density_bonus: f32,
    #[serde(default = "default_cluster_radius")]
    pub cluster_radius: f32,
    #[serde(default = "default_bacteria_heading_interval")]
    pub heading_interval: f32,
    #[serde(default = "default_reproduction_tick")]
    pub reproduction_tick: f32,
    #[serde(default = "default_reproduction_base")]
    pub reproduction_base: u32,
    #[serde(default = "default_reproduction_cluster_penalty")]
    pub reproduction_cluster_penalty: u32,
    #[serde(default = "default_reproduction_floor")]
    pub reproduction_floor: u32,
    #[serde(default = "default_offspring_offset")]
    pub offspring_offset: f32,
}

// Macrophage sensing and feeding constants
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MacrophageConfig {
    #[serde(default = "default_sensing_radius")]
    pub sensing_radius: f32,
    #[serde(default = "default_chemokine_scan_radius")]
    pub chemokine_scan_radius: f32,
    #[serde(default = "default_contact_radius")]
    pub contact_radius: f32,
    #[serde(default = "default_feeding_distance")]
    pub feeding_distance: f32,
    #[serde(default = "default_feeding_interval")]
    pub feeding_interval: f32,
    #[serde(default = "default_stale_target_distance")]
    pub stale_target_distance: f32,
    #[serde(default = "default_idle_heading_interval")]
    pub idle_heading_interval: f32,
    #[serde(default = "default_agitated_heading_interval")]
    pub agitated_heading_interval: f32,
    #[serde(default = "default_pursuit_multiplier")]
    pub pursuit_multiplier: f32,
}

/// Whether chemokine samples from all cells share one rolling window or each cell keeps its own.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowScope {
    Shared,
    PerCell,
}

// Epithelial cell layout and chemokine signalling
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CellsConfig {
    #[serde(default = "default_cell_columns")]
    pub columns: u32,
    #[serde(default = "default_cell_rows")]
    pub rows: u32,
    #[serde(default = "default_cell_spacing")]
    pub spacing: f32,
    #[serde(default = "default_cell_contact_radius")]
    pub contact_radius: f32,
    /// The rolling window is only allocated when there are more cells than this.
    #[serde(default = "default_window_threshold")]
    pub window_threshold: u32,
    #[serde(default = "default_window_scope")]
    pub window_scope: WindowScope,
    #[serde(default = "default_secretion_per_bacterium")]
    pub secretion_per_bacterium: f32,
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,
}

// Win/loss bookkeeping
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GameConfig {
    #[serde(default = "default_bacteria_retries")]
    pub bacteria_retries: u32,
    #[serde(default = "default_win_population")]
    pub win_population: u32,
    #[serde(default = "default_loss_retries_below")]
    pub loss_retries_below: u32,
    /// A flowing bacterium is expelled by a cough when a uniform draw exceeds this value.
    #[serde(default = "default_cough_probability")]
    pub cough_probability: f32,
}

// Initial conditions for the simulation, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    pub seed: u64,
    /// Bacteria placed with a Gaussian spread at start. Zero means bacteria only arrive on demand.
    #[serde(default)]
    pub initial_bacteria: u32,
    #[serde(default = "default_initial_spread_fraction")]
    pub initial_spread_fraction: f32,
}

/// Something that happens to the simulation at a scripted time.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioAction {
    /// A parachuted bacterium lands, consuming one retry.
    Drop { x: f32, z: f32 },
    /// A bacterium is placed directly.
    Place { x: f32, z: f32 },
    Cough,
    KillAll,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ScenarioStep {
    pub time: f32,
    #[serde(flatten)]
    pub action: ScenarioAction,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_positions: bool,
    pub save_stats: bool,
    #[serde(default)]
    pub save_positions_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub floor: FloorConfig,
    pub timing: TimingConfig,
    pub model: ModelParameter,
    #[serde(default)]
    pub bacteria: BacteriaConfig,
    #[serde(default)]
    pub macrophage: MacrophageConfig,
    #[serde(default)]
    pub cells: CellsConfig,
    #[serde(default)]
    pub game: GameConfig,
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub scenario: Vec<ScenarioStep>,
    pub output: OutputConfig,
}

impl Default for BacteriaConfig {
    fn default() -> Self {
        BacteriaConfig {
            motile: false,
            density_radius: default_density_radius(),
            density_bonus: default_density_bonus(),
            cluster_radius: default_cluster_radius(),
            heading_interval: default_bacteria_heading_interval(),
            reproduction_tick: default_reproduction_tick(),
            reproduction_base: default_reproduction_base(),
            reproduction_cluster_penalty: default_reproduction_cluster_penalty(),
            reproduction_floor: default_reproduction_floor(),
            offspring_offset: default_offspring_offset(),
        }
    }
}

impl Default for MacrophageConfig {
    fn default() -> Self {
        MacrophageConfig {
            sensing_radius: default_sensing_radius(),
            chemokine_scan_radius: default_chemokine_scan_radius(),
            contact_radius: default_contact_radius(),
            feeding_distance: default_feeding_distance(),
            feeding_interval: default_feeding_interval(),
            stale_target_distance: default_stale_target_distance(),
            idle_heading_interval: default_idle_heading_interval(),
            agitated_heading_interval: default_agitated_heading_interval(),
            pursuit_multiplier: default_pursuit_multiplier(),
        }
    }
}

impl Default for CellsConfig {
    fn default() -> Self {
        CellsConfig {
            columns: default_cell_columns(),
            rows: default_cell_rows(),
            spacing: default_cell_spacing(),
            contact_radius: default_cell_contact_radius(),
            window_threshold: default_window_threshold(),
            window_scope: default_window_scope(),
            secretion_per_bacterium: default_secretion_per_bacterium(),
            decay_rate: default_decay_rate(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            bacteria_retries: default_bacteria_retries(),
            win_population: default_win_population(),
            loss_retries_below: default_loss_retries_below(),
            cough_probability: default_cough_probability(),
        }
    }
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.floor.width <= 0.0 || self.floor.height <= 0.0 {
            anyhow::bail!("floor width and height must be positive.");
        }
        if self.timing.dt <= 0.0 {
            anyhow::bail!("timing.dt must be positive.");
        }
        if self.model.bacteria_default_health <= 0 {
            anyhow::bail!("bacteria_default_health must be greater than 0.");
        }
        if self.model.macrophage_damage < 0 {
            anyhow::bail!("macrophage_damage must not be negative.");
        }
        if !(0.0..=1.0).contains(&self.model.probability_interchanged) {
            anyhow::bail!("probability_interchanged must be within [0, 1].");
        }
        if self.bacteria.cluster_radius <= 0.0 {
            anyhow::bail!("bacteria.cluster_radius must be positive.");
        }
        if self.bacteria.heading_interval <= 0.0 || self.bacteria.reproduction_tick <= 0.0 {
            anyhow::bail!("bacteria timer intervals must be positive.");
        }
        if self.macrophage.feeding_interval <= 0.0
            || self.macrophage.idle_heading_interval <= 0.0
            || self.macrophage.agitated_heading_interval <= 0.0
        {
            anyhow::bail!("macrophage timer intervals must be positive.");
        }
        if self.bacteria.offspring_offset < 0.0 {
            anyhow::bail!("bacteria.offspring_offset must not be negative.");
        }
        if self.cells.spacing < 0.0 {
            anyhow::bail!("cells.spacing must not be negative.");
        }
        if self.cells.columns.checked_mul(self.cells.rows).is_none() {
            anyhow::bail!("cells.columns * cells.rows overflows.");
        }
        if !(0.0..=1.0).contains(&self.game.cough_probability) {
            anyhow::bail!("game.cough_probability must be within [0, 1].");
        }
        if self.scenario.iter().any(|step| step.time < 0.0) {
            anyhow::bail!("scenario step times must not be negative.");
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let b = &self.bacteria;
        let m = &self.macrophage;
        let c = &self.cells;

        let sensitivity = self.model.sensitivity_to_feel_cytokine_gradient;

        SimParams {
            // Floor
            half_width: self.floor.width / 2.0,
            half_height: self.floor.height / 2.0,
            // Time
            dt: self.timing.dt,
            // Bacteria
            bacteria_default_health: self.model.bacteria_default_health,
            flowing_step: self.model.movement_in_flowing_phase,
            sessile_step: self.model.movement_in_sessile_phase,
            probability_interchanged: self.model.probability_interchanged,
            bacteria_motile: b.motile,
            density_radius: b.density_radius,
            density_bonus: b.density_bonus,
            cluster_radius: b.cluster_radius,
            bacteria_heading_interval: b.heading_interval,
            reproduction_tick: b.reproduction_tick,
            reproduction_base: b.reproduction_base,
            reproduction_cluster_penalty: b.reproduction_cluster_penalty,
            reproduction_floor: b.reproduction_floor,
            offspring_offset: b.offspring_offset,
            // Macrophages
            macrophage_damage: self.model.macrophage_damage,
            macrophage_speed: self.model.macrophage_movement,
            sensing_radius: m.sensing_radius,
            chemokine_scan_radius: m.chemokine_scan_radius,
            macrophage_contact_radius: m.contact_radius,
            feeding_distance: m.feeding_distance,
            feeding_interval: m.feeding_interval,
            stale_target_distance: m.stale_target_distance,
            idle_heading_interval: m.idle_heading_interval,
            agitated_heading_interval: m.agitated_heading_interval,
            pursuit_multiplier: m.pursuit_multiplier,
            // Cells
            cell_contact_radius: c.contact_radius,
            chemokine_sensitivity: if sensitivity > 0.0 { Some(sensitivity) } else { None },
            window_threshold: c.window_threshold,
            window_scope: c.window_scope,
            secretion_per_bacterium: c.secretion_per_bacterium,
            chemokine_decay_rate: c.decay_rate,
            // Game
            win_population: self.game.win_population,
            loss_retries_below: self.game.loss_retries_below,
            cough_probability: self.game.cough_probability,
        }
    }
}

fn default_number_of_bacteria() -> u32 { 100 }
fn default_density_radius() -> f32 { 1.5 }
fn default_density_bonus() -> f32 { 0.2 }
fn default_cluster_radius() -> f32 { 10.0 }
fn default_bacteria_heading_interval() -> f32 { 0.1 }
fn default_reproduction_tick() -> f32 { 1.0 }
fn default_reproduction_base() -> u32 { 200 }
fn default_reproduction_cluster_penalty() -> u32 { 5 }
fn default_reproduction_floor() -> u32 { 30 }
fn default_offspring_offset() -> f32 { 1.0 }

fn default_sensing_radius() -> f32 { 30.0 }
fn default_chemokine_scan_radius() -> f32 { 40.0 }
fn default_contact_radius() -> f32 { 3.0 }
fn default_feeding_distance() -> f32 { 1.4 }
fn default_feeding_interval() -> f32 { 0.25 }
fn default_stale_target_distance() -> f32 { 40.0 }
fn default_idle_heading_interval() -> f32 { 3.0 }
fn default_agitated_heading_interval() -> f32 { 0.1 }
fn default_pursuit_multiplier() -> f32 { 4.0 }

fn default_cell_columns() -> u32 { 4 }
fn default_cell_rows() -> u32 { 4 }
fn default_cell_spacing() -> f32 { 30.0 } // Epithelial cell width
fn default_cell_contact_radius() -> f32 { 15.0 }
fn default_window_threshold() -> u32 { 5 }
fn default_window_scope() -> WindowScope { WindowScope::Shared }
fn default_secretion_per_bacterium() -> f32 { 1.0 }
fn default_decay_rate() -> f32 { 0.1 }

fn default_bacteria_retries() -> u32 { 20 }
fn default_win_population() -> u32 { 100 }
fn default_loss_retries_below() -> u32 { 3 }
fn default_cough_probability() -> f32 { 0.995 }

fn default_initial_spread_fraction() -> f32 { 0.25 }
