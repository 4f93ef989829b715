use crate::bacterium::{Bacterium, MovementState};
use crate::cell::Cell;
use crate::chemokine::ChemokineWindow;
use crate::cluster::ClusterRegistry;
use crate::error::SimError;
use crate::events::{RemovalCause, SimEvent};
use crate::macrophage::{Macrophage, MacrophageState};
use crate::spatial::{BacteriaGrid, EntityKind, EntityRef};
use crate::vecmath::{angle_to_vec, random_heading};
use crate::{BacteriumId, CellId, MacrophageId};
use anyhow::Result;
use immune_common::{
    GameOutcome, ScenarioAction, ScenarioStep, SimParams, SimulationConfig, Snapshot, Vec2, WindowScope,
};
use log::{debug, info, trace, warn};
use rand::distr::Uniform;
use rand::prelude::*;
use rand_distr::Normal;
use rayon::prelude::*;
use slotmap::SlotMap;
use std::collections::BTreeSet;

/// Owns every agent and the clock that drives them.
///
/// A step runs, in order: scripted scenario actions, bacteria timers (heading, phase,
/// reproduction), contact detection, macrophage behaviour (heading, movement, sensing,
/// feeding), chemokine secretion, and the win/loss check. Agents are visited in arena
/// order; removals never happen while an arena is being iterated.
pub struct Simulation {
    config: SimulationConfig,
    params: SimParams,
    /// Host-side RNG for every random decision, seeded from the configuration.
    rng: StdRng,
    current_time_step: u64,
    time: f64,
    bacteria: SlotMap<BacteriumId, Bacterium>,
    macrophages: SlotMap<MacrophageId, Macrophage>,
    cells: SlotMap<CellId, Cell>,
    clusters: ClusterRegistry,
    bacteria_index: BacteriaGrid,
    index_dirty: bool,
    /// Window shared by all cells, when the scope is shared and enough cells exist.
    shared_window: Option<ChemokineWindow>,
    scenario: Vec<ScenarioStep>,
    next_scenario_step: usize,
    retries: u32,
    outcome: GameOutcome,
    total_eaten: u32,
    events: Vec<SimEvent>,
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Creates a simulation, laying out cells, placing macrophages and any initial bacteria.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();
        let rng = StdRng::seed_from_u64(config.initial_conditions.seed);

        let mut scenario = config.scenario.clone();
        scenario.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));

        let bacteria_index = BacteriaGrid::new(params.cluster_radius, params.half_width, params.half_height);

        let mut sim = Self {
            retries: config.game.bacteria_retries,
            config,
            params,
            rng,
            current_time_step: 0,
            time: 0.0,
            bacteria: SlotMap::with_key(),
            macrophages: SlotMap::with_key(),
            cells: SlotMap::with_key(),
            clusters: ClusterRegistry::new(),
            bacteria_index,
            index_dirty: false,
            shared_window: None,
            scenario,
            next_scenario_step: 0,
            outcome: GameOutcome::Running,
            total_eaten: 0,
            events: Vec::new(),
            recorded_snapshots: Vec::new(),
        };

        sim.place_cells();
        sim.place_macrophages()?;
        sim.place_initial_bacteria()?;
        Ok(sim)
    }

    /// Lays the epithelium out as a grid centred on the floor and allocates chemokine windows.
    fn place_cells(&mut self) {
        let columns = self.config.cells.columns;
        let rows = self.config.cells.rows;
        let spacing = self.config.cells.spacing;
        let count = columns as usize * rows as usize;

        let window_len = ChemokineWindow::allocation_for(count, self.params.window_threshold);
        match (self.params.window_scope, window_len) {
            (WindowScope::Shared, Some(len)) => self.shared_window = Some(ChemokineWindow::new(len)),
            (_, None) => debug!("{} cells do not exceed the window threshold; levels stay at 0.", count),
            _ => {}
        }
        let per_cell_len = match self.params.window_scope {
            WindowScope::PerCell => window_len,
            WindowScope::Shared => None,
        };

        let offset_x = (columns as f32 - 1.0) * spacing / 2.0;
        let offset_y = (rows as f32 - 1.0) * spacing / 2.0;
        for row in 0..rows {
            for col in 0..columns {
                let position = Vec2::new(col as f32 * spacing - offset_x, row as f32 * spacing - offset_y)
                    .clamp_centered(self.params.half_width, self.params.half_height);
                self.cells.insert(Cell::new(
                    position,
                    self.params.chemokine_sensitivity,
                    per_cell_len.map(ChemokineWindow::new),
                ));
            }
        }
        info!("Placed {} epithelial cells ({}x{}).", count, columns, rows);
    }

    /// Macrophages start uniformly within the central half of the floor.
    fn place_macrophages(&mut self) -> Result<()> {
        let reach_x = self.params.half_width / 2.0;
        let reach_y = self.params.half_height / 2.0;
        let dist_x = Uniform::new_inclusive(-reach_x, reach_x)?;
        let dist_y = Uniform::new_inclusive(-reach_y, reach_y)?;
        for _ in 0..self.config.model.number_of_macrophages {
            let position = Vec2::new(self.rng.sample(dist_x), self.rng.sample(dist_y));
            self.spawn_macrophage(position);
        }
        info!("Placed {} macrophages.", self.macrophages.len());
        Ok(())
    }

    /// Optional Gaussian seeding around the floor centre.
    fn place_initial_bacteria(&mut self) -> Result<()> {
        let count = self.config.initial_conditions.initial_bacteria;
        if count == 0 {
            return Ok(());
        }
        let spread = self.config.initial_conditions.initial_spread_fraction;
        let dist_x = Normal::new(0.0f32, self.config.floor.width * spread)
            .map_err(|e| SimError::InvalidConfig(format!("initial_spread_fraction: {}", e)))?;
        let dist_y = Normal::new(0.0f32, self.config.floor.height * spread)
            .map_err(|e| SimError::InvalidConfig(format!("initial_spread_fraction: {}", e)))?;
        for _ in 0..count {
            let x = self.rng.sample(dist_x);
            let z = self.rng.sample(dist_y);
            self.create_bacterium(x, z, false);
        }
        info!("Seeded {} initial bacteria.", count);
        Ok(())
    }

    /// Advances the simulation by one physics timestep (`dt`).
    pub fn step(&mut self) {
        self.current_time_step += 1;
        self.time = self.current_time_step as f64 * self.params.dt as f64;
        let now = self.time;

        let states_before: Vec<(MacrophageId, MacrophageState)> =
            self.macrophages.iter().map(|(id, m)| (id, m.state())).collect();

        self.run_scenario(now);
        self.update_bacteria(now);
        self.update_contacts();
        self.update_macrophages(now);
        self.update_chemokine();
        self.check_outcome();

        for (id, before) in states_before {
            if let Some(mac) = self.macrophages.get(id) {
                if mac.state() != before {
                    trace!("Macrophage {:?}: {:?} -> {:?}", id, before, mac.state());
                    self.events.push(SimEvent::MacrophageStateChanged { id, from: before, to: mac.state() });
                }
            }
        }
    }

    fn run_scenario(&mut self, now: f64) {
        while let Some(step) = self.scenario.get(self.next_scenario_step) {
            if step.time as f64 > now + 1e-9 {
                break;
            }
            let action = step.action.clone();
            self.next_scenario_step += 1;
            debug!("t={:.2}: scenario action {:?}", now, action);
            match action {
                ScenarioAction::Drop { x, z } => {
                    self.drop_bacterium(x, z);
                }
                ScenarioAction::Place { x, z } => {
                    self.create_bacterium(x, z, false);
                }
                ScenarioAction::Cough => {
                    self.cough();
                }
                ScenarioAction::KillAll => {
                    self.kill_all();
                }
            }
        }
    }

    // --- Bacteria ---

    /// Heading, phase interchange, optional locomotion and reproduction for every bacterium.
    /// Offspring are created after the pass so the registry is not mutated mid-iteration.
    fn update_bacteria(&mut self, now: f64) {
        let dt = self.params.dt;
        let ids: Vec<BacteriumId> = self.bacteria.keys().collect();
        let mut offspring: Vec<Vec2> = Vec::new();

        for id in ids {
            let cluster_size = self.cluster_size(id);
            let threshold = self.params.doubling_threshold(cluster_size);
            let Some(b) = self.bacteria.get_mut(id) else { continue };

            if b.heading_timer.poll(now) {
                b.set_new_heading(&mut self.rng);
            }
            b.interchange_phase(&mut self.rng, self.params.probability_interchanged);
            if self.params.bacteria_motile {
                b.advance(dt, &self.params);
                self.index_dirty = true;
            }
            if b.reproduction_timer.poll(now) && b.advance_doubling(threshold) {
                offspring.push(b.position);
            }
        }

        for parent in offspring {
            let offset = angle_to_vec(random_heading(&mut self.rng))
                .scale(self.rng.random::<f32>() * self.params.offspring_offset);
            let child = parent + offset;
            self.create_bacterium(child.x, child.y, true);
        }
    }

    /// Creates a bacterium at floor position `(x, z)`, clusters it and lets every bacterium
    /// recompute its density bonus.
    pub fn create_bacterium(&mut self, x: f32, z: f32, random_rotation: bool) -> BacteriumId {
        let position = Vec2::new(x, z).clamp_centered(self.params.half_width, self.params.half_height);
        let orientation = if random_rotation { self.rng.random_range(0.0..360.0) } else { 0.0 };
        let id = self.bacteria.insert(Bacterium::new(position, orientation, &self.params, self.time));
        self.index_dirty = true;

        let cluster_size = match self.calculate_cluster(id) {
            Ok(size) => size,
            Err(e) => {
                warn!("Clustering new bacterium failed: {}", e);
                1
            }
        };
        self.bacteria_landed();

        debug!("Bacterium {:?} landed at ({:.2}, {:.2}); cluster of {}.", id, position.x, position.y, cluster_size);
        self.events.push(SimEvent::BacteriumSpawned { id, position, cluster_size });
        id
    }

    /// A parachuted bacterium lands: consumes one retry, then creates the bacterium.
    pub fn drop_bacterium(&mut self, x: f32, z: f32) -> BacteriumId {
        self.retries = self.retries.saturating_sub(1);
        let id = self.create_bacterium(x, z, false);
        debug!("Drop landed; {} retries left, cluster of {}.", self.retries, self.cluster_size(id));
        id
    }

    /// Rebuilds the cluster containing `id` from the proximity graph. Returns its size.
    pub fn calculate_cluster(&mut self, id: BacteriumId) -> Result<usize, SimError> {
        if !self.bacteria.contains_key(id) {
            return Err(SimError::UnknownBacterium(id));
        }
        self.refresh_index();

        let radius = self.params.cluster_radius;
        let radius_sq = radius * radius;
        let bacteria = &self.bacteria;
        let index = &self.bacteria_index;

        let (cluster, members) = self.clusters.calculate_cluster(
            id,
            |node| {
                let Some(b) = bacteria.get(node) else { return Vec::new() };
                let mut adjacent = Vec::new();
                index.for_each_within(b.position, radius, |other, _, dist_sq| {
                    if other != node && dist_sq < radius_sq && bacteria.contains_key(other) {
                        adjacent.push(other);
                    }
                });
                adjacent
            },
            |node| bacteria.get(node).and_then(|b| b.cluster()),
        );

        for member in &members {
            if let Some(b) = self.bacteria.get_mut(*member) {
                b.set_cluster(cluster);
            }
        }
        Ok(members.len())
    }

    /// Size of the cluster `id` belongs to; 0 for unknown or unclustered bacteria.
    pub fn cluster_size(&self, id: BacteriumId) -> usize {
        self.bacteria
            .get(id)
            .and_then(|b| b.cluster())
            .map_or(0, |cluster| self.clusters.size_of(cluster))
    }

    /// Every bacterium recounts its neighbours within the density radius and updates its
    /// health multiplier. Counting runs over a position snapshot.
    fn bacteria_landed(&mut self) {
        self.refresh_index();
        let radius = self.params.density_radius;
        let bonus = self.params.density_bonus;

        let counts = self.density_neighbour_counts(radius);
        let mut exhausted = Vec::new();
        for (id, count) in counts {
            if let Some(b) = self.bacteria.get_mut(id) {
                b.set_density_neighbours(count, bonus);
                if b.health_points() <= 0 && !b.is_dead() {
                    b.mark_dead();
                    exhausted.push(id);
                }
            }
        }

        // Losing neighbours lowers maximum health and can leave accumulated damage fatal.
        for id in exhausted {
            if let Err(e) = self.remove_bacterium(id, RemovalCause::Killed) {
                warn!("Removing exhausted bacterium failed: {}", e);
            }
        }
    }

    /// Number of other live bacteria within `radius` of each bacterium.
    fn density_neighbour_counts(&self, radius: f32) -> Vec<(BacteriumId, usize)> {
        let snapshot: Vec<(BacteriumId, Vec2)> = self.bacteria.iter().map(|(id, b)| (id, b.position)).collect();
        let index = &self.bacteria_index;
        let bacteria = &self.bacteria;
        snapshot
            .par_iter()
            .map(|&(id, pos)| {
                let mut count = 0;
                index.for_each_within(pos, radius, |other, _, _| {
                    if other != id && bacteria.contains_key(other) {
                        count += 1;
                    }
                });
                (id, count)
            })
            .collect()
    }

    /// Applies damage to a bacterium and returns its remaining health. The first time health
    /// drops to zero or below the bacterium dies: subscribers are notified and it is removed.
    pub fn reduce_bacterium_health(&mut self, id: BacteriumId, damage: i32) -> Result<i32, SimError> {
        let b = self.bacteria.get_mut(id).ok_or(SimError::UnknownBacterium(id))?;
        let was_dead = b.is_dead();
        let remaining = b.reduce_health(damage);
        if !was_dead && b.is_dead() {
            self.remove_bacterium(id, RemovalCause::Killed)?;
        }
        Ok(remaining)
    }

    /// Takes a bacterium out of the simulation: deregisters it from its cluster and the cells
    /// it touches, notifies macrophages feeding on it and drops it from every contact set.
    fn remove_bacterium(&mut self, id: BacteriumId, cause: RemovalCause) -> Result<(), SimError> {
        let mut b = self.bacteria.remove(id).ok_or(SimError::UnknownBacterium(id))?;
        b.mark_dead();
        self.index_dirty = true;

        if let Some(cluster) = b.cluster() {
            let remaining = self.clusters.remove_member(cluster, id);
            trace!("Bacterium {:?} left its cluster; {} remain.", id, remaining);
        }
        for cell_id in b.close_to_cells() {
            if let Some(cell) = self.cells.get_mut(*cell_id) {
                cell.remove_bacterium();
            }
        }

        // Every feeder is credited, but the bacterium counts once towards the total.
        let eaten = cause == RemovalCause::Killed;
        let mut fed_on = false;
        for mac_id in b.take_subscribers() {
            let Some(mac) = self.macrophages.get_mut(mac_id) else { continue };
            if mac.feeding().is_some_and(|f| f.target == id) {
                mac.finish_feeding(eaten);
                fed_on = true;
                if eaten {
                    self.events.push(SimEvent::BacteriumEaten { macrophage: mac_id, bacterium: id });
                }
            }
        }
        if eaten && fed_on {
            self.total_eaten += 1;
        }
        for (_, mac) in self.macrophages.iter_mut() {
            mac.forget_bacterium(id);
        }

        debug!("Bacterium {:?} removed ({:?}).", id, cause);
        self.events.push(SimEvent::BacteriumRemoved { id, cause });
        Ok(())
    }

    /// Expels each flowing bacterium independently when a uniform draw exceeds the cough
    /// probability. Returns the number expelled.
    pub fn cough(&mut self) -> usize {
        let flowing: Vec<BacteriumId> = self
            .bacteria
            .iter()
            .filter(|(_, b)| b.state() == MovementState::Flowing)
            .map(|(id, _)| id)
            .collect();
        debug!("{} flowing bacteria found", flowing.len());

        let mut expelled = 0;
        for id in flowing {
            if self.rng.random::<f32>() > self.params.cough_probability
                && self.remove_bacterium(id, RemovalCause::Coughed).is_ok()
            {
                expelled += 1;
            }
        }
        info!("Cough expelled {} bacteria.", expelled);
        expelled
    }

    /// Removes every bacterium. Returns how many were removed.
    pub fn kill_all(&mut self) -> usize {
        let ids: Vec<BacteriumId> = self.bacteria.keys().collect();
        let removed = ids
            .into_iter()
            .filter(|&id| self.remove_bacterium(id, RemovalCause::Cleared).is_ok())
            .count();
        info!("Killed all {} bacteria.", removed);
        removed
    }

    /// Forces a bacterium into a movement phase.
    pub fn set_movement_state(&mut self, id: BacteriumId, state: MovementState) -> Result<(), SimError> {
        let b = self.bacteria.get_mut(id).ok_or(SimError::UnknownBacterium(id))?;
        b.set_state(state);
        Ok(())
    }

    fn refresh_index(&mut self) {
        if self.index_dirty {
            self.bacteria_index.rebuild(self.bacteria.iter().map(|(id, b)| (id, b.position)));
            self.index_dirty = false;
        }
    }

    // --- Contacts ---

    /// Proximity events: which cells each bacterium and macrophage touches, and which
    /// bacteria are inside each macrophage's contact radius.
    fn update_contacts(&mut self) {
        self.refresh_index();
        let cell_positions: Vec<(CellId, Vec2)> = self.cells.iter().map(|(id, c)| (id, c.position)).collect();
        let cell_radius_sq = self.params.cell_contact_radius * self.params.cell_contact_radius;
        let touching = |pos: Vec2| -> Vec<CellId> {
            cell_positions
                .iter()
                .filter(|(_, cell_pos)| cell_pos.distance_squared(pos) <= cell_radius_sq)
                .map(|(id, _)| *id)
                .collect()
        };

        for (_, b) in self.bacteria.iter_mut() {
            let now_touching = touching(b.position);
            if now_touching == b.close_to_cells {
                continue;
            }
            for cell_id in now_touching.iter().filter(|c| !b.close_to_cells.contains(c)) {
                if let Some(cell) = self.cells.get_mut(*cell_id) {
                    cell.add_bacterium();
                }
            }
            for cell_id in b.close_to_cells.iter().filter(|c| !now_touching.contains(c)) {
                if let Some(cell) = self.cells.get_mut(*cell_id) {
                    cell.remove_bacterium();
                }
            }
            b.close_to_cells = now_touching;
        }

        let contact = self.params.macrophage_contact_radius;
        let index = &self.bacteria_index;
        let bacteria = &self.bacteria;
        for (mac_id, mac) in self.macrophages.iter_mut() {
            let now_touching = touching(mac.position);
            if now_touching != mac.touching_cells {
                for cell_id in &now_touching {
                    if let Some(cell) = self.cells.get_mut(*cell_id) {
                        cell.add_macrophage(mac_id);
                    }
                }
                for cell_id in mac.touching_cells.iter().filter(|c| !now_touching.contains(c)) {
                    if let Some(cell) = self.cells.get_mut(*cell_id) {
                        cell.remove_macrophage(mac_id);
                    }
                }
                mac.touching_cells = now_touching;
            }

            let mut in_range = BTreeSet::new();
            index.for_each_within(mac.position, contact, |id, _, _| {
                if bacteria.contains_key(id) {
                    in_range.insert(id);
                }
            });
            if in_range != *mac.in_range() {
                mac.set_in_range(in_range);
            }
        }
    }

    // --- Macrophages ---

    /// Places a macrophage on the floor.
    pub fn spawn_macrophage(&mut self, position: Vec2) -> MacrophageId {
        let position = position.clamp_centered(self.params.half_width, self.params.half_height);
        self.macrophages.insert(Macrophage::new(position, &self.params, self.time))
    }

    /// Removes a macrophage, cancelling its feeding subscription and cell contacts.
    pub fn remove_macrophage(&mut self, id: MacrophageId) -> Result<(), SimError> {
        let mac = self.macrophages.remove(id).ok_or(SimError::UnknownMacrophage(id))?;
        if let Some(target) = mac.feeding().map(|f| f.target) {
            if let Some(b) = self.bacteria.get_mut(target) {
                b.unsubscribe(id);
            }
        }
        for cell_id in mac.touching_cells() {
            if let Some(cell) = self.cells.get_mut(*cell_id) {
                cell.remove_macrophage(id);
            }
        }
        Ok(())
    }

    fn update_macrophages(&mut self, now: f64) {
        let dt = self.params.dt;
        let ids: Vec<MacrophageId> = self.macrophages.keys().collect();
        for id in ids {
            self.update_heading(id, now);

            let Some(mac) = self.macrophages.get_mut(id) else { continue };
            mac.advance(dt, &self.params);
            let position = mac.position;

            if mac.state() != MacrophageState::BacteriaInRange {
                let strongest = self.strongest_chemokine_near(position, self.params.chemokine_scan_radius);
                if let Some(mac) = self.macrophages.get_mut(id) {
                    mac.sense_chemokine(strongest);
                }
            }

            self.try_begin_feeding(id, now);
            self.feed(id, now);
        }
    }

    /// Picks a new heading when the heading timer is due, according to the current state.
    fn update_heading(&mut self, id: MacrophageId, now: f64) {
        let Some(mac) = self.macrophages.get(id) else { return };
        if !mac.heading_timer.is_due(now) {
            return;
        }
        let position = mac.position;

        match mac.state() {
            MacrophageState::Idle => {
                if let Some(mac) = self.macrophages.get_mut(id) {
                    mac.wander(&mut self.rng);
                }
            }
            MacrophageState::ChemokineFound => {
                let candidates = self.cells_with_chemokine_near(position, self.params.sensing_radius);
                if let Some(mac) = self.macrophages.get_mut(id) {
                    if !mac.head_for_chemokine(&candidates) {
                        trace!("Macrophage {:?} found no cell within sensing range.", id);
                    }
                }
            }
            MacrophageState::BacteriaInRange => {
                let nearest = self.nearest_bacterium(position);
                let stale = self.params.stale_target_distance;
                if let Some(mac) = self.macrophages.get_mut(id) {
                    mac.head_for_bacterium(nearest, stale);
                }
            }
        }

        if let Some(mac) = self.macrophages.get_mut(id) {
            let interval = mac.heading_interval(&self.params);
            mac.heading_timer.reschedule(interval, now);
        }
    }

    /// Begins feeding on the closest in-range bacterium within feeding distance, unless
    /// the macrophage is already feeding.
    fn try_begin_feeding(&mut self, id: MacrophageId, now: f64) {
        let Some(mac) = self.macrophages.get(id) else { return };
        if mac.is_feeding() {
            return;
        }
        let reach_sq = self.params.feeding_distance * self.params.feeding_distance;
        let position = mac.position;
        let target = mac
            .in_range()
            .iter()
            .filter_map(|b| self.bacteria.get(*b).map(|bact| (*b, bact.position.distance_squared(position))))
            .filter(|(_, dist_sq)| *dist_sq < reach_sq)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(b, _)| b);

        let Some(target) = target else { return };
        let interval = self.params.feeding_interval;
        if let Some(mac) = self.macrophages.get_mut(id) {
            if mac.begin_feeding(target, interval, now) {
                if let Some(b) = self.bacteria.get_mut(target) {
                    b.subscribe(id);
                }
                debug!("Macrophage {:?} started feeding on {:?}.", id, target);
                self.events.push(SimEvent::FeedingStarted { macrophage: id, bacterium: target });
            }
        }
    }

    /// Applies one bite when due. A target that vanished without dying ends the feeding.
    fn feed(&mut self, id: MacrophageId, now: f64) {
        let Some(mac) = self.macrophages.get_mut(id) else { return };
        let Some(target) = mac.poll_feeding(now) else { return };

        let alive = self.bacteria.get(target).is_some_and(|b| b.health_points() > 0);
        if !alive {
            if let Some(mac) = self.macrophages.get_mut(id) {
                mac.finish_feeding(false);
            }
            trace!("Macrophage {:?} lost its meal {:?}.", id, target);
            return;
        }

        let damage = self.params.macrophage_damage;
        match self.reduce_bacterium_health(target, damage) {
            Ok(remaining) => trace!("Macrophage {:?} bit {:?}; {} health left.", id, target, remaining),
            Err(e) => warn!("Feeding bite failed: {}", e),
        }
    }

    fn nearest_bacterium(&self, position: Vec2) -> Option<(BacteriumId, Vec2)> {
        let mut best: Option<(BacteriumId, Vec2, f32)> = None;
        for (id, b) in self.bacteria.iter() {
            let dist_sq = b.position.distance_squared(position);
            if best.map_or(true, |(_, _, d)| dist_sq < d) {
                best = Some((id, b.position, dist_sq));
            }
        }
        best.map(|(id, pos, _)| (id, pos))
    }

    fn cells_with_chemokine_near(&self, position: Vec2, radius: f32) -> Vec<(CellId, Vec2, f32)> {
        let radius_sq = radius * radius;
        self.cells
            .iter()
            .filter(|(_, c)| c.position.distance_squared(position) <= radius_sq)
            .map(|(id, c)| (id, c.position, c.chemokine()))
            .collect()
    }

    fn strongest_chemokine_near(&self, position: Vec2, radius: f32) -> Option<f32> {
        self.cells_with_chemokine_near(position, radius)
            .into_iter()
            .map(|(_, _, chemokine)| chemokine)
            .reduce(f32::max)
    }

    // --- Cells ---

    /// Secretion and decay for every cell, then each new reading goes through its window.
    fn update_chemokine(&mut self) {
        let dt = self.params.dt;
        let secretion = self.params.secretion_per_bacterium;
        let decay = self.params.chemokine_decay_rate;
        for (_, cell) in self.cells.iter_mut() {
            let next = cell.secreted_chemokine(dt, secretion, decay);
            cell.set_chemokine(next, self.shared_window.as_mut());
        }
    }

    /// Sets a cell's raw chemokine reading directly.
    pub fn set_cell_chemokine(&mut self, id: CellId, value: f32) -> Result<(), SimError> {
        let cell = self.cells.get_mut(id).ok_or(SimError::UnknownCell(id))?;
        cell.set_chemokine(value, self.shared_window.as_mut());
        Ok(())
    }

    // --- Game ---

    fn check_outcome(&mut self) {
        if self.outcome != GameOutcome::Running {
            return;
        }
        let count = self.bacteria.len();
        if count == 0 && self.retries < self.params.loss_retries_below {
            self.outcome = GameOutcome::Lost;
            info!("t={:.2}: all bacteria are gone with {} retries left. Lost.", self.time, self.retries);
        } else if count > self.params.win_population as usize {
            self.outcome = GameOutcome::Won;
            self.retries = 0;
            info!("t={:.2}: population reached {}. Won.", self.time, count);
        } else {
            return;
        }
        self.events.push(SimEvent::OutcomeReached(self.outcome));
    }

    // --- Queries ---

    /// All entities of `kind` within `radius` of `point`.
    pub fn entities_within(&mut self, kind: EntityKind, point: Vec2, radius: f32) -> Vec<EntityRef> {
        let radius_sq = radius * radius;
        match kind {
            EntityKind::Bacterium => {
                self.refresh_index();
                self.bacteria_index
                    .within(point, radius)
                    .into_iter()
                    .filter(|id| self.bacteria.contains_key(*id))
                    .map(EntityRef::Bacterium)
                    .collect()
            }
            EntityKind::Macrophage => self
                .macrophages
                .iter()
                .filter(|(_, m)| m.position.distance_squared(point) <= radius_sq)
                .map(|(id, _)| EntityRef::Macrophage(id))
                .collect(),
            EntityKind::Cell => self
                .cells
                .iter()
                .filter(|(_, c)| c.position.distance_squared(point) <= radius_sq)
                .map(|(id, _)| EntityRef::Cell(id))
                .collect(),
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn current_time_step(&self) -> u64 {
        self.current_time_step
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn bacteria_count(&self) -> usize {
        self.bacteria.len()
    }

    pub fn macrophage_count(&self) -> usize {
        self.macrophages.len()
    }

    pub fn bacterium(&self, id: BacteriumId) -> Option<&Bacterium> {
        self.bacteria.get(id)
    }

    pub fn macrophage(&self, id: MacrophageId) -> Option<&Macrophage> {
        self.macrophages.get(id)
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn bacteria(&self) -> impl Iterator<Item = (BacteriumId, &Bacterium)> + '_ {
        self.bacteria.iter()
    }

    pub fn macrophages(&self) -> impl Iterator<Item = (MacrophageId, &Macrophage)> + '_ {
        self.macrophages.iter()
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> + '_ {
        self.cells.iter()
    }

    pub fn clusters(&self) -> &ClusterRegistry {
        &self.clusters
    }

    pub fn shared_window(&self) -> Option<&ChemokineWindow> {
        self.shared_window.as_ref()
    }

    pub fn outcome(&self) -> GameOutcome {
        self.outcome
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn total_eaten(&self) -> u32 {
        self.total_eaten
    }

    /// Events recorded since the last drain.
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Current bacteria positions as `(x, z)` pairs.
    pub fn get_results(&self) -> Vec<(f32, f32)> {
        self.bacteria.values().map(|b| (b.position.x, b.position.y)).collect()
    }

    // --- Snapshots ---

    /// Records population, cluster, feeding and chemokine statistics at the current time.
    pub fn record_snapshot(&mut self) {
        self.refresh_index();

        let mut sessile_count = 0;
        let mut flowing_count = 0;
        for b in self.bacteria.values() {
            match b.state() {
                MovementState::Sessile => sessile_count += 1,
                MovementState::Flowing => flowing_count += 1,
            }
        }

        let mut macrophage_states = [0u32; 3];
        for m in self.macrophages.values() {
            macrophage_states[m.state().index()] += 1;
        }

        let neighbour_counts = self.density_neighbour_counts(self.params.density_radius);
        let mean_density_neighbors = if neighbour_counts.is_empty() {
            0.0
        } else {
            neighbour_counts.iter().map(|(_, n)| *n as f32).sum::<f32>() / neighbour_counts.len() as f32
        };

        let mean_chemokine_level = if self.cells.is_empty() {
            0.0
        } else {
            self.cells.values().map(|c| c.chemokine_level()).sum::<f32>() / self.cells.len() as f32
        };

        let positions = if self.config.output.save_positions_in_snapshot {
            Some(self.get_results())
        } else {
            None
        };

        let snapshot = Snapshot {
            time: self.time as f32,
            bacteria_count: self.bacteria.len() as u32,
            sessile_count,
            flowing_count,
            macrophage_count: self.macrophages.len() as u32,
            macrophage_states,
            cluster_count: self.clusters.len() as u32,
            largest_cluster: self.clusters.largest() as u32,
            mean_density_neighbors,
            bacteria_eaten: self.total_eaten,
            mean_chemokine_level,
            retries_left: self.retries,
            outcome: self.outcome,
            positions,
        };
        debug!(
            "Snapshot t={:.2}: {} bacteria in {} clusters, {} eaten.",
            snapshot.time, snapshot.bacteria_count, snapshot.cluster_count, snapshot.bacteria_eaten
        );
        self.recorded_snapshots.push(snapshot);
    }

    /// Provides access to the recorded snapshots.
    pub fn get_recorded_snapshots(&self) -> &Vec<Snapshot> {
        &self.recorded_snapshots
    }
}
