#![allow(dead_code)]

use immune_simulation::{Simulation, SimulationConfig};

/// A quiet world: no macrophages, no cells, bacteria never change phase.
pub const BASE_CONFIG: &str = r#"
    [floor]
    width = 200.0
    height = 200.0

    [timing]
    dt = 0.05
    total_time = 10.0
    record_interval = 1.0

    [model]
    bacteria_default_health = 10
    movement_in_flowing_phase = 2.0
    movement_in_sessile_phase = 0.2
    probability_interchanged = 1.0
    macrophage_damage = 4
    macrophage_movement = 1.0
    sensitivity_to_feel_cytokine_gradient = 0.01
    number_of_macrophages = 0

    [cells]
    columns = 0
    rows = 0

    [initial_conditions]
    seed = 99

    [output]
    base_filename = "integration"
    save_positions = false
    save_stats = false
"#;

pub fn config() -> SimulationConfig {
    SimulationConfig::from_toml_str(BASE_CONFIG).expect("base config parses")
}

pub fn build(config: SimulationConfig) -> Simulation {
    Simulation::new(config).expect("simulation builds")
}

pub fn run(sim: &mut Simulation, steps: usize) {
    for _ in 0..steps {
        sim.step();
    }
}
