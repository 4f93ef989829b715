use crate::timer::PeriodicTimer;
use crate::vecmath::{angle_to_vec, random_heading};
use crate::{CellId, ClusterId, MacrophageId};
use immune_common::{SimParams, Vec2};
use rand::Rng;

/// Locomotion regime of a bacterium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementState {
    Sessile,
    Flowing,
}

#[derive(Debug, Clone)]
pub struct Bacterium {
    pub position: Vec2,
    /// Rotation about the vertical axis in degrees. Cosmetic.
    pub orientation: f32,
    state: MovementState,
    /// Current heading angle in radians.
    heading: f32,
    base_health: i32,
    health_multiplier: f32,
    damage_received: i32,
    dead: bool,
    cluster: Option<ClusterId>,
    doubling_counter: u32,
    /// Cells this bacterium is currently touching.
    pub(crate) close_to_cells: Vec<CellId>,
    /// Macrophages to notify when this bacterium dies.
    death_subscribers: Vec<MacrophageId>,
    pub(crate) heading_timer: PeriodicTimer,
    pub(crate) reproduction_timer: PeriodicTimer,
}

impl Bacterium {
    pub fn new(position: Vec2, orientation: f32, params: &SimParams, now: f64) -> Self {
        Self {
            position,
            orientation,
            state: MovementState::Sessile,
            heading: 0.0,
            base_health: params.bacteria_default_health,
            health_multiplier: 1.0,
            damage_received: 0,
            dead: false,
            cluster: None,
            doubling_counter: 0,
            close_to_cells: Vec::new(),
            death_subscribers: Vec::new(),
            heading_timer: PeriodicTimer::immediate(params.bacteria_heading_interval, now),
            reproduction_timer: PeriodicTimer::delayed(params.reproduction_tick, now),
        }
    }

    /// `round(base * multiplier) - damage`.
    pub fn health_points(&self) -> i32 {
        (self.base_health as f32 * self.health_multiplier).round() as i32 - self.damage_received
    }

    /// Accumulates damage and returns the remaining health. The bacterium is marked dead
    /// the first time health drops to zero or below; damage to a dead bacterium is ignored.
    pub fn reduce_health(&mut self, damage: i32) -> i32 {
        if self.dead {
            return self.health_points();
        }
        self.damage_received += damage;
        let remaining = self.health_points();
        if remaining <= 0 {
            self.dead = true;
        }
        remaining
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub(crate) fn mark_dead(&mut self) {
        self.dead = true;
    }

    pub fn damage_received(&self) -> i32 {
        self.damage_received
    }

    pub fn health_multiplier(&self) -> f32 {
        self.health_multiplier
    }

    /// Sets the local-density bonus from the number of other bacteria nearby.
    pub fn set_density_neighbours(&mut self, neighbours: usize, bonus_per_neighbour: f32) {
        self.health_multiplier = 1.0 + bonus_per_neighbour * neighbours as f32;
    }

    pub fn state(&self) -> MovementState {
        self.state
    }

    pub fn set_state(&mut self, state: MovementState) {
        self.state = state;
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn set_new_heading<R: Rng>(&mut self, rng: &mut R) {
        self.heading = random_heading(rng);
    }

    /// Flips between sessile and flowing when a uniform draw exceeds `probability`.
    pub fn interchange_phase<R: Rng>(&mut self, rng: &mut R, probability: f32) -> bool {
        if rng.random::<f32>() > probability {
            self.state = match self.state {
                MovementState::Flowing => MovementState::Sessile,
                MovementState::Sessile => MovementState::Flowing,
            };
            true
        } else {
            false
        }
    }

    pub fn step_size(&self, params: &SimParams) -> f32 {
        match self.state {
            MovementState::Flowing => params.flowing_step,
            MovementState::Sessile => params.sessile_step,
        }
    }

    /// Translates along the heading by the phase's step size and keeps the bacterium on the floor.
    pub fn advance(&mut self, dt: f32, params: &SimParams) {
        let step = angle_to_vec(self.heading).scale(self.step_size(params) * dt);
        self.position = (self.position + step).clamp_centered(params.half_width, params.half_height);
    }

    pub fn cluster(&self) -> Option<ClusterId> {
        self.cluster
    }

    pub(crate) fn set_cluster(&mut self, cluster: ClusterId) {
        self.cluster = Some(cluster);
    }

    pub fn doubling_counter(&self) -> u32 {
        self.doubling_counter
    }

    /// Counts one reproduction tick. Returns true, and restarts the count, once the
    /// counter exceeds `threshold`.
    pub fn advance_doubling(&mut self, threshold: u32) -> bool {
        self.doubling_counter += 1;
        if self.doubling_counter > threshold {
            self.doubling_counter = 0;
            true
        } else {
            false
        }
    }

    pub fn close_to_cells(&self) -> &[CellId] {
        &self.close_to_cells
    }

    pub fn death_subscribers(&self) -> &[MacrophageId] {
        &self.death_subscribers
    }

    pub fn subscribe(&mut self, macrophage: MacrophageId) {
        if !self.death_subscribers.contains(&macrophage) {
            self.death_subscribers.push(macrophage);
        }
    }

    pub fn unsubscribe(&mut self, macrophage: MacrophageId) {
        self.death_subscribers.retain(|&m| m != macrophage);
    }

    pub(crate) fn take_subscribers(&mut self) -> Vec<MacrophageId> {
        std::mem::take(&mut self.death_subscribers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use immune_common::SimulationConfig;
    use rand::{SeedableRng, rngs::StdRng};

    fn params() -> SimParams {
        SimulationConfig::from_toml_str(crate::simulation::tests::CONFIG)
            .expect("test config parses")
            .get_sim_params()
    }

    #[test]
    fn damage_sequence_kills_on_third_hit() {
        let params = params();
        let mut b = Bacterium::new(Vec2::zero(), 0.0, &params, 0.0);
        assert_eq!(b.health_points(), 10);
        assert_eq!(b.reduce_health(4), 6);
        assert!(!b.is_dead());
        assert_eq!(b.reduce_health(4), 2);
        assert!(!b.is_dead());
        assert!(b.reduce_health(4) <= 0);
        assert!(b.is_dead());

        // Further damage is ignored once dead.
        let after = b.damage_received();
        b.reduce_health(4);
        assert_eq!(b.damage_received(), after);
    }

    #[test]
    fn health_scales_with_density_bonus() {
        let params = params();
        let mut b = Bacterium::new(Vec2::zero(), 0.0, &params, 0.0);
        b.set_density_neighbours(3, 0.2);
        assert!((b.health_multiplier() - 1.6).abs() < 1e-6);
        assert_eq!(b.health_points(), 16);
    }

    #[test]
    fn health_never_increases_under_damage() {
        let params = params();
        let mut b = Bacterium::new(Vec2::zero(), 0.0, &params, 0.0);
        b.set_density_neighbours(2, 0.2);
        let mut last = b.health_points();
        for damage in [0, 1, 3, 2, 5] {
            let now = b.reduce_health(damage);
            assert!(now <= last);
            last = now;
        }
    }

    #[test]
    fn doubling_counter_resets_after_exceeding_threshold() {
        let params = params();
        let mut b = Bacterium::new(Vec2::zero(), 0.0, &params, 0.0);
        for _ in 0..3 {
            assert!(!b.advance_doubling(3));
        }
        assert!(b.advance_doubling(3));
        assert_eq!(b.doubling_counter(), 0);
    }

    #[test]
    fn interchange_respects_probability() {
        let params = params();
        let mut rng = StdRng::seed_from_u64(11);
        let mut b = Bacterium::new(Vec2::zero(), 0.0, &params, 0.0);

        // A draw in [0, 1) never exceeds 1.0.
        for _ in 0..100 {
            assert!(!b.interchange_phase(&mut rng, 1.0));
        }
        assert_eq!(b.state(), MovementState::Sessile);

        assert!(b.interchange_phase(&mut rng, -1.0));
        assert_eq!(b.state(), MovementState::Flowing);
        assert_eq!(b.step_size(&params), params.flowing_step);
    }

    #[test]
    fn advance_clamps_to_floor() {
        let params = params();
        let mut b = Bacterium::new(Vec2::new(params.half_width - 0.01, 0.0), 0.0, &params, 0.0);
        b.set_state(MovementState::Flowing);
        b.advance(100.0, &params);
        assert_eq!(b.position.x, params.half_width);
    }
}
