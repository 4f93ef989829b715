mod common;

use immune_simulation::{RemovalCause, SimError, SimEvent};

#[test]
fn three_bites_of_four_kill_a_ten_health_bacterium_once() {
    let mut sim = common::build(common::config());
    let id = sim.create_bacterium(0.0, 0.0, false);

    assert_eq!(sim.reduce_bacterium_health(id, 4), Ok(6));
    assert_eq!(sim.reduce_bacterium_health(id, 4), Ok(2));
    let last = sim.reduce_bacterium_health(id, 4).expect("still registered before the fatal bite");
    assert!(last <= 0);

    assert!(sim.bacterium(id).is_none());
    assert_eq!(sim.bacteria_count(), 0);
    assert_eq!(sim.reduce_bacterium_health(id, 4), Err(SimError::UnknownBacterium(id)));

    let deaths = sim
        .events()
        .iter()
        .filter(|e| matches!(e, SimEvent::BacteriumRemoved { id: dead, cause: RemovalCause::Killed } if *dead == id))
        .count();
    assert_eq!(deaths, 1);
}

#[test]
fn nearby_bacteria_share_one_cluster() {
    let mut sim = common::build(common::config());
    let a = sim.create_bacterium(0.0, 0.0, false);
    let b = sim.create_bacterium(4.0, 0.0, false);
    let c = sim.create_bacterium(0.0, 4.0, false);
    let far = sim.create_bacterium(60.0, 60.0, false);

    for id in [a, b, c] {
        assert_eq!(sim.cluster_size(id), 3);
        assert_eq!(sim.calculate_cluster(id), Ok(3));
    }
    assert_eq!(sim.cluster_size(far), 1);
    assert_eq!(sim.clusters().len(), 2);
    assert_eq!(sim.clusters().largest(), 3);
}

#[test]
fn a_bridging_bacterium_merges_two_clusters() {
    let mut sim = common::build(common::config());
    let left = sim.create_bacterium(0.0, 0.0, false);
    let right = sim.create_bacterium(15.0, 0.0, false);
    assert_eq!(sim.clusters().len(), 2);

    let bridge = sim.create_bacterium(7.5, 0.0, false);
    assert_eq!(sim.clusters().len(), 1);
    for id in [left, right, bridge] {
        assert_eq!(sim.cluster_size(id), 3);
    }
}

#[test]
fn bacteria_land_inside_the_floor() {
    let mut sim = common::build(common::config());
    let id = sim.create_bacterium(500.0, -500.0, true);
    let b = sim.bacterium(id).expect("alive");
    assert_eq!(b.position.x, 100.0);
    assert_eq!(b.position.y, -100.0);
    assert!((0.0..360.0).contains(&b.orientation));
}

#[test]
fn a_bacterium_doubles_after_its_wait() {
    let mut config = common::config();
    config.bacteria.reproduction_floor = 2;
    config.bacteria.reproduction_base = 2;
    config.bacteria.reproduction_cluster_penalty = 0;
    let mut sim = common::build(config);
    let parent = sim.create_bacterium(0.0, 0.0, false);

    // Two reproduction ticks are not enough.
    common::run(&mut sim, 50);
    assert_eq!(sim.bacteria_count(), 1);

    // The third tick (t = 3) exceeds the wait of 2.
    common::run(&mut sim, 20);
    assert_eq!(sim.bacteria_count(), 2);
    assert_eq!(sim.cluster_size(parent), 2);

    let child = sim
        .bacteria()
        .map(|(id, _)| id)
        .find(|id| *id != parent)
        .expect("offspring exists");
    let offset = sim.bacterium(child).expect("alive").position.distance(sim.bacterium(parent).expect("alive").position);
    assert!(offset <= 1.0 + 1e-5);
}

#[test]
fn sessile_bacteria_stay_put_unless_motile() {
    let mut sim = common::build(common::config());
    let id = sim.create_bacterium(3.0, 3.0, false);
    common::run(&mut sim, 20);
    assert_eq!(sim.bacterium(id).expect("alive").position, immune_simulation::Vec2::new(3.0, 3.0));

    let mut config = common::config();
    config.bacteria.motile = true;
    let mut sim = common::build(config);
    let id = sim.create_bacterium(3.0, 3.0, false);
    common::run(&mut sim, 20);
    let moved = sim.bacterium(id).expect("alive").position.distance(immune_simulation::Vec2::new(3.0, 3.0));
    assert!(moved > 0.0);
    // Sessile step 0.2 per unit time for one time unit, in straight segments.
    assert!(moved <= 0.2 + 1e-4);
}

#[test]
fn gaussian_seeding_places_initial_bacteria() {
    let mut config = common::config();
    config.initial_conditions.initial_bacteria = 25;
    let sim = common::build(config);
    assert_eq!(sim.bacteria_count(), 25);
    for (_, b) in sim.bacteria() {
        assert!(b.position.x.abs() <= 100.0 && b.position.y.abs() <= 100.0);
        assert!(b.cluster().is_some());
    }
    let clustered: usize = sim.clusters().iter().map(|(_, members)| members.len()).sum();
    assert_eq!(clustered, 25);
}
