mod common;

use immune_common::WindowScope;
use immune_simulation::{CellId, SimError};

fn grid(columns: u32, rows: u32, scope: WindowScope) -> immune_simulation::Simulation {
    let mut config = common::config();
    config.cells.columns = columns;
    config.cells.rows = rows;
    config.cells.window_scope = scope;
    common::build(config)
}

fn cell_ids(sim: &immune_simulation::Simulation) -> Vec<CellId> {
    sim.cells().map(|(id, _)| id).collect()
}

#[test]
fn cells_are_laid_out_centred_on_the_floor() {
    let sim = grid(3, 3, WindowScope::Shared);
    let positions: Vec<_> = sim.cells().map(|(_, c)| c.position).collect();
    assert_eq!(positions.len(), 9);
    let sum_x: f32 = positions.iter().map(|p| p.x).sum();
    let sum_y: f32 = positions.iter().map(|p| p.y).sum();
    assert!(sum_x.abs() < 1e-3 && sum_y.abs() < 1e-3);
    assert!(positions.iter().any(|p| p.x == 0.0 && p.y == 0.0));
}

#[test]
fn shared_window_spans_all_cells() {
    let sim = grid(3, 3, WindowScope::Shared);
    assert_eq!(sim.shared_window().map(|w| w.len()), Some(9));
    assert!(sim.cells().all(|(_, c)| !c.has_own_window()));
}

#[test]
fn per_cell_windows_replace_the_shared_one() {
    let sim = grid(3, 3, WindowScope::PerCell);
    assert!(sim.shared_window().is_none());
    assert!(sim.cells().all(|(_, c)| c.has_own_window()));
}

#[test]
fn few_cells_get_no_window() {
    let mut sim = grid(2, 2, WindowScope::Shared);
    assert!(sim.shared_window().is_none());
    let first = cell_ids(&sim)[0];
    sim.set_cell_chemokine(first, 7.0).expect("known cell");
    assert_eq!(sim.cell(first).expect("cell").chemokine_level(), 0.0);
    assert_eq!(sim.cell(first).expect("cell").raw_chemokine(), 7.0);
}

#[test]
fn shared_levels_normalize_against_every_reading() {
    let mut sim = grid(3, 3, WindowScope::Shared);
    let ids = cell_ids(&sim);

    sim.set_cell_chemokine(ids[0], 10.0).expect("known cell");
    assert_eq!(sim.cell(ids[0]).expect("cell").chemokine_level(), 100.0);

    sim.set_cell_chemokine(ids[1], 5.0).expect("known cell");
    assert_eq!(sim.cell(ids[1]).expect("cell").chemokine_level(), 50.0);
    assert_eq!(sim.shared_window().map(|w| (w.min(), w.max())), Some((0.0, 10.0)));
}

#[test]
fn a_flat_window_reads_zero() {
    let mut sim = grid(3, 3, WindowScope::PerCell);
    let id = cell_ids(&sim)[4];
    sim.set_cell_chemokine(id, 0.0).expect("known cell");
    assert_eq!(sim.cell(id).expect("cell").chemokine_level(), 0.0);
}

#[test]
fn bacteria_on_a_cell_raise_its_chemokine() {
    let mut sim = grid(3, 3, WindowScope::Shared);
    let centre = sim
        .cells()
        .find(|(_, c)| c.position.x == 0.0 && c.position.y == 0.0)
        .map(|(id, _)| id)
        .expect("centre cell");
    sim.create_bacterium(0.0, 0.0, false);
    sim.create_bacterium(1.0, 0.0, false);

    common::run(&mut sim, 10);
    let cell = sim.cell(centre).expect("cell");
    assert_eq!(cell.bacteria_on_cell(), 2);
    assert!(cell.raw_chemokine() > 0.5);
    assert!(cell.chemokine_level() > 0.0);

    let quiet = sim
        .cells()
        .find(|(_, c)| c.position.x != 0.0 && c.position.y != 0.0)
        .map(|(_, c)| c)
        .expect("corner cell");
    assert_eq!(quiet.raw_chemokine(), 0.0);
}

#[test]
fn unknown_cells_are_rejected() {
    let mut sim = grid(3, 3, WindowScope::Shared);
    let mut other = grid(4, 4, WindowScope::Shared);
    let foreign = cell_ids(&other)[15];
    other.set_cell_chemokine(foreign, 1.0).expect("known to its own simulation");
    assert_eq!(sim.set_cell_chemokine(foreign, 1.0), Err(SimError::UnknownCell(foreign)));
}
