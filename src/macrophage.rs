use crate::timer::PeriodicTimer;
use crate::vecmath::random_direction;
use crate::{BacteriumId, CellId};
use immune_common::{SimParams, Vec2};
use log::warn;
use rand::Rng;
use std::collections::BTreeSet;

/// Movement states a macrophage can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacrophageState {
    /// Nothing sensed; wander.
    Idle,
    /// Chemokine sensed nearby; head for the strongest signal.
    ChemokineFound,
    /// Bacteria in contact range; pursue the nearest one.
    BacteriaInRange,
}

impl MacrophageState {
    /// The state implied by what the macrophage currently senses.
    pub fn resolve(bacteria_in_range: usize, chemokine_sensed: f32) -> Self {
        if bacteria_in_range > 0 {
            MacrophageState::BacteriaInRange
        } else if chemokine_sensed > 0.0 {
            MacrophageState::ChemokineFound
        } else {
            MacrophageState::Idle
        }
    }

    pub fn index(self) -> usize {
        match self {
            MacrophageState::Idle => 0,
            MacrophageState::ChemokineFound => 1,
            MacrophageState::BacteriaInRange => 2,
        }
    }
}

/// What a macrophage is currently heading for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// No target; the macrophage wanders.
    Itself,
    Cell(CellId),
    Bacterium(BacteriumId),
}

/// Repeated damage applied to one bacterium until it dies or disappears.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedingProcess {
    pub target: BacteriumId,
    pub(crate) timer: PeriodicTimer,
}

#[derive(Debug, Clone)]
pub struct Macrophage {
    pub position: Vec2,
    state: MacrophageState,
    last_state: MacrophageState,
    target: Target,
    direction: Vec2,
    /// Bacteria currently inside the contact radius.
    in_range: BTreeSet<BacteriumId>,
    bacteria_eaten: u32,
    feeding: Option<FeedingProcess>,
    /// Cells this macrophage is currently touching.
    pub(crate) touching_cells: Vec<CellId>,
    pub(crate) heading_timer: PeriodicTimer,
}

impl Macrophage {
    pub fn new(position: Vec2, params: &SimParams, now: f64) -> Self {
        Self {
            position,
            state: MacrophageState::Idle,
            last_state: MacrophageState::Idle,
            target: Target::Itself,
            direction: Vec2::new(1.0, 1.0),
            in_range: BTreeSet::new(),
            bacteria_eaten: 0,
            feeding: None,
            touching_cells: Vec::new(),
            heading_timer: PeriodicTimer::immediate(params.idle_heading_interval, now),
        }
    }

    pub fn state(&self) -> MacrophageState {
        self.state
    }

    pub fn last_state(&self) -> MacrophageState {
        self.last_state
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn bacteria_eaten(&self) -> u32 {
        self.bacteria_eaten
    }

    pub fn bacteria_near(&self) -> usize {
        self.in_range.len()
    }

    pub fn in_range(&self) -> &BTreeSet<BacteriumId> {
        &self.in_range
    }

    pub fn feeding(&self) -> Option<&FeedingProcess> {
        self.feeding.as_ref()
    }

    pub fn is_feeding(&self) -> bool {
        self.feeding.is_some()
    }

    pub fn touching_cells(&self) -> &[CellId] {
        &self.touching_cells
    }

    /// Switches state, remembering the previous one. Leaving `Idle` makes the next heading
    /// update happen straight away rather than after the idle interval.
    fn set_state(&mut self, state: MacrophageState) {
        if state != self.state {
            if self.state == MacrophageState::Idle {
                self.heading_timer.expedite();
            }
            self.last_state = self.state;
            self.state = state;
        }
    }

    /// Replaces the set of bacteria in contact range. A non-empty set forces
    /// `BacteriaInRange`; emptying it reverts to the state held before pursuit.
    pub fn set_in_range(&mut self, in_range: BTreeSet<BacteriumId>) {
        self.in_range = in_range;
        self.apply_bacteria_near();
    }

    /// Drops one bacterium from the contact set, e.g. when it leaves the simulation.
    pub fn forget_bacterium(&mut self, bacterium: BacteriumId) {
        if self.in_range.remove(&bacterium) {
            self.apply_bacteria_near();
        }
        if self.target == Target::Bacterium(bacterium) {
            self.target = Target::Itself;
        }
    }

    fn apply_bacteria_near(&mut self) {
        if !self.in_range.is_empty() {
            self.set_state(MacrophageState::BacteriaInRange);
        } else if self.state == MacrophageState::BacteriaInRange {
            let previous = if self.last_state == MacrophageState::BacteriaInRange {
                MacrophageState::Idle
            } else {
                self.last_state
            };
            self.set_state(previous);
        }
    }

    /// Updates the state from the strongest chemokine reading within the scan radius.
    /// Has no effect while bacteria are in range.
    pub fn sense_chemokine(&mut self, strongest: Option<f32>) {
        if self.state == MacrophageState::BacteriaInRange {
            return;
        }
        let sensed = strongest.unwrap_or(0.0);
        self.set_state(MacrophageState::resolve(0, sensed));
    }

    /// Seconds until the next heading update for the current state.
    pub fn heading_interval(&self, params: &SimParams) -> f32 {
        match self.state {
            MacrophageState::Idle => params.idle_heading_interval,
            _ => params.agitated_heading_interval,
        }
    }

    /// Idle heading: a random direction with no target.
    pub fn wander<R: Rng>(&mut self, rng: &mut R) {
        self.direction = random_direction(rng);
        self.target = Target::Itself;
    }

    /// Heads for the cell with the highest chemokine reading; the first one wins ties.
    /// Returns false when no cell was offered.
    pub fn head_for_chemokine(&mut self, cells: &[(CellId, Vec2, f32)]) -> bool {
        let mut best: Option<&(CellId, Vec2, f32)> = None;
        for candidate in cells {
            if best.map_or(true, |b| candidate.2 > b.2) {
                best = Some(candidate);
            }
        }
        match best {
            Some(&(id, pos, _)) => {
                self.target = Target::Cell(id);
                self.direction = (pos - self.position).normalize_or_zero();
                true
            }
            None => false,
        }
    }

    /// Heads for the nearest bacterium. A nearest bacterium further away than
    /// `stale_distance` means the in-range bookkeeping is stale: the macrophage goes idle.
    pub fn head_for_bacterium(&mut self, nearest: Option<(BacteriumId, Vec2)>, stale_distance: f32) {
        let Some((id, pos)) = nearest else {
            return;
        };
        if pos.distance(self.position) > stale_distance {
            warn!(
                "Nearest bacterium is {:.1} away while in pursuit; treating as stale and going idle.",
                pos.distance(self.position)
            );
            self.set_state(MacrophageState::Idle);
            return;
        }
        self.target = Target::Bacterium(id);
        self.direction = (pos - self.position).normalize_or_zero();
    }

    pub fn speed(&self, params: &SimParams) -> f32 {
        if self.state == MacrophageState::BacteriaInRange {
            params.macrophage_speed * params.pursuit_multiplier
        } else {
            params.macrophage_speed
        }
    }

    /// Moves towards `position + direction` and keeps the macrophage on the floor.
    pub fn advance(&mut self, dt: f32, params: &SimParams) {
        let goal = self.position + self.direction;
        self.position = self
            .position
            .move_towards(goal, self.speed(params) * dt)
            .clamp_centered(params.half_width, params.half_height);
    }

    /// Starts feeding on `target` unless already feeding. The first bite is due at `now`.
    pub fn begin_feeding(&mut self, target: BacteriumId, interval: f32, now: f64) -> bool {
        if self.feeding.is_some() {
            return false;
        }
        self.feeding = Some(FeedingProcess { target, timer: PeriodicTimer::immediate(interval, now) });
        true
    }

    /// The bacterium to bite now, if a bite is due.
    pub fn poll_feeding(&mut self, now: f64) -> Option<BacteriumId> {
        let feeding = self.feeding.as_mut()?;
        feeding.timer.poll(now).then_some(feeding.target)
    }

    /// Ends the feeding process. `eaten` counts the target as consumed.
    pub fn finish_feeding(&mut self, eaten: bool) -> Option<BacteriumId> {
        let finished = self.feeding.take()?;
        if eaten {
            self.bacteria_eaten += 1;
        }
        self.forget_bacterium(finished.target);
        Some(finished.target)
    }
}
