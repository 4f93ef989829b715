pub use immune_common::vecmath::{Vec2, angle_to_vec, clamp};
use rand::Rng;

/// A uniformly random heading in `[0, 2π)`.
pub fn random_heading<R: Rng>(rng: &mut R) -> f32 {
    rng.random::<f32>() * std::f32::consts::TAU
}

/// A direction with each component drawn from `[-1, 1)`. Not normalized.
pub fn random_direction<R: Rng>(rng: &mut R) -> Vec2 {
    Vec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn random_heading_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let h = random_heading(&mut rng);
            assert!((0.0..std::f32::consts::TAU).contains(&h));
        }
    }
}
