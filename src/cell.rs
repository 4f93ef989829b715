use crate::chemokine::ChemokineWindow;
use crate::MacrophageId;
use immune_common::Vec2;

/// An epithelial cell: a fixed patch of floor that tracks who is touching it and
/// secretes chemokine while bacteria sit on it.
#[derive(Debug, Clone)]
pub struct Cell {
    pub position: Vec2,
    bacteria_on_cell: u32,
    macrophages_on_cell: Vec<MacrophageId>,
    raw_chemokine: f32,
    /// Normalized level in `[0, 100]`, only updated while a window is allocated.
    chemokine_level: f32,
    /// Present when windows are per cell.
    window: Option<ChemokineWindow>,
    sensitivity: Option<f32>,
}

impl Cell {
    pub fn new(position: Vec2, sensitivity: Option<f32>, window: Option<ChemokineWindow>) -> Self {
        Self {
            position,
            bacteria_on_cell: 0,
            macrophages_on_cell: Vec::new(),
            raw_chemokine: 0.0,
            chemokine_level: 0.0,
            window,
            sensitivity,
        }
    }

    /// Stores the raw reading and, if a window applies, records it there and refreshes the
    /// normalized level. The cell's own window wins over `shared`.
    pub fn set_chemokine(&mut self, value: f32, shared: Option<&mut ChemokineWindow>) {
        self.raw_chemokine = value;
        let window = match self.window.as_mut() {
            Some(own) => Some(own),
            None => shared,
        };
        if let Some(window) = window {
            self.chemokine_level = window.record(value);
        }
    }

    /// The raw reading quantized to the sensing step, or 0 when sensing is not configured.
    pub fn chemokine(&self) -> f32 {
        match self.sensitivity {
            Some(step) if step > 0.0 => (self.raw_chemokine / step).round() * step,
            _ => 0.0,
        }
    }

    pub fn raw_chemokine(&self) -> f32 {
        self.raw_chemokine
    }

    pub fn chemokine_level(&self) -> f32 {
        self.chemokine_level
    }

    pub fn has_own_window(&self) -> bool {
        self.window.is_some()
    }

    /// Next raw reading after `dt`: the current value decays and every bacterium on the
    /// cell adds `secretion` per unit time.
    pub fn secreted_chemokine(&self, dt: f32, secretion: f32, decay_rate: f32) -> f32 {
        let retained = self.raw_chemokine * (1.0 - decay_rate * dt).max(0.0);
        retained + secretion * self.bacteria_on_cell as f32 * dt
    }

    pub fn bacteria_on_cell(&self) -> u32 {
        self.bacteria_on_cell
    }

    pub fn add_bacterium(&mut self) {
        self.bacteria_on_cell += 1;
    }

    /// Decrements the contact count, never below zero.
    pub fn remove_bacterium(&mut self) {
        self.bacteria_on_cell = self.bacteria_on_cell.saturating_sub(1);
    }

    pub fn macrophages_on_cell(&self) -> &[MacrophageId] {
        &self.macrophages_on_cell
    }

    /// Records a touching macrophage. Already recorded macrophages are not added twice.
    pub fn add_macrophage(&mut self, id: MacrophageId) {
        if !self.macrophages_on_cell.contains(&id) {
            self.macrophages_on_cell.push(id);
        }
    }

    pub fn remove_macrophage(&mut self, id: MacrophageId) {
        self.macrophages_on_cell.retain(|&m| m != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn chemokine_is_quantized_to_sensitivity() {
        let mut cell = Cell::new(Vec2::zero(), Some(0.5), None);
        cell.set_chemokine(1.3, None);
        assert_eq!(cell.raw_chemokine(), 1.3);
        assert_eq!(cell.chemokine(), 1.5);

        cell.set_chemokine(0.2, None);
        assert_eq!(cell.chemokine(), 0.0);
    }

    #[test]
    fn unconfigured_sensitivity_reads_zero() {
        let mut cell = Cell::new(Vec2::zero(), None, None);
        cell.set_chemokine(42.0, None);
        assert_eq!(cell.chemokine(), 0.0);
    }

    #[test]
    fn level_uses_shared_window_when_cell_has_none() {
        let mut shared = ChemokineWindow::new(8);
        let mut cell = Cell::new(Vec2::zero(), Some(0.1), None);
        cell.set_chemokine(3.0, Some(&mut shared));
        assert_eq!(cell.chemokine_level(), 100.0);
        assert_eq!(shared.max(), 3.0);

        // Without any window the level keeps its last value.
        let mut lonely = Cell::new(Vec2::zero(), Some(0.1), None);
        lonely.set_chemokine(3.0, None);
        assert_eq!(lonely.chemokine_level(), 0.0);
    }

    #[test]
    fn own_window_takes_precedence() {
        let mut shared = ChemokineWindow::new(8);
        let mut cell = Cell::new(Vec2::zero(), Some(0.1), Some(ChemokineWindow::new(8)));
        cell.set_chemokine(3.0, Some(&mut shared));
        assert_eq!(shared.max(), 0.0);
        assert_eq!(cell.chemokine_level(), 100.0);
    }

    #[test]
    fn contact_bookkeeping() {
        let mut macs: SlotMap<MacrophageId, ()> = SlotMap::with_key();
        let m = macs.insert(());
        let mut cell = Cell::new(Vec2::zero(), Some(0.1), None);

        cell.add_macrophage(m);
        cell.add_macrophage(m);
        assert_eq!(cell.macrophages_on_cell(), &[m]);
        cell.remove_macrophage(m);
        assert!(cell.macrophages_on_cell().is_empty());

        cell.remove_bacterium();
        assert_eq!(cell.bacteria_on_cell(), 0);
        cell.add_bacterium();
        cell.add_bacterium();
        cell.remove_bacterium();
        assert_eq!(cell.bacteria_on_cell(), 1);
    }

    #[test]
    fn secretion_decays_and_accumulates() {
        let mut cell = Cell::new(Vec2::zero(), Some(0.1), None);
        cell.add_bacterium();
        cell.add_bacterium();
        let next = cell.secreted_chemokine(0.5, 1.0, 0.0);
        assert_eq!(next, 1.0);

        cell.set_chemokine(10.0, None);
        cell.remove_bacterium();
        cell.remove_bacterium();
        let decayed = cell.secreted_chemokine(1.0, 1.0, 0.5);
        assert_eq!(decayed, 5.0);
    }
}
