use arenasim::core::{Particle, Scene, Vec2};
use proptest::prelude::*;

const ARENA: f64 = 200.0;
const RADIUS: f64 = 4.0;

fn particle_params() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (
        RADIUS..(ARENA - RADIUS),
        RADIUS..(ARENA - RADIUS),
        -30.0..30.0f64,
        -30.0..30.0f64,
    )
}

fn build_scene(params: &[(f64, f64, f64, f64)]) -> Scene {
    let particles = params
        .iter()
        .map(|&(x, y, vx, vy)| {
            Particle::new(Vec2::new(x, y), Vec2::new(vx, vy), RADIUS, 1.0)
                .expect("parameters are valid by construction")
        })
        .collect();
    Scene::new(particles, ARENA, ARENA).expect("arena admits every particle")
}

proptest! {
    /// Any configuration of disks (overlapping spawns included, thanks to
    /// the construction-time corrector) keeps both step invariants: bounds
    /// containment and non-interpenetration.
    #[test]
    fn step_preserves_invariants(params in prop::collection::vec(particle_params(), 1..8)) {
        let mut scene = build_scene(&params);
        for _ in 0..3 {
            scene.step().expect("step should not fail");
        }

        for p in &scene.particles {
            prop_assert!(p.pos.x >= p.radius - 1e-6 && p.pos.x <= ARENA - p.radius + 1e-6);
            prop_assert!(p.pos.y >= p.radius - 1e-6 && p.pos.y <= ARENA - p.radius + 1e-6);
        }
        let n = scene.num_particles();
        for i in 0..n {
            for j in (i + 1)..n {
                let dist = (scene.particles[i].pos - scene.particles[j].pos).length();
                let min_dist = scene.particles[i].radius + scene.particles[j].radius;
                prop_assert!(dist >= min_dist - 1e-6, "pair ({}, {}) overlaps: {}", i, j, dist);
            }
        }
    }

    /// Kinetic energy stays constant over a frame regardless of how many
    /// wall bounces and pair collisions it contains.
    #[test]
    fn step_conserves_energy(params in prop::collection::vec(particle_params(), 1..8)) {
        let mut scene = build_scene(&params);
        let e0 = scene.kinetic_energy();
        scene.step().expect("step should not fail");
        let e1 = scene.kinetic_energy();
        prop_assert!((e1 - e0).abs() <= 1e-9 * e0.max(1.0), "energy drift: {} -> {}", e0, e1);
    }

    /// Even extreme velocities cannot push a lone particle out of the
    /// arena in a single frame.
    #[test]
    fn fast_lone_particle_stays_contained(
        x in RADIUS..(ARENA - RADIUS),
        y in RADIUS..(ARENA - RADIUS),
        vx in -2000.0..2000.0f64,
        vy in -2000.0..2000.0f64,
    ) {
        let p = Particle::new(Vec2::new(x, y), Vec2::new(vx, vy), RADIUS, 1.0)
            .expect("parameters are valid by construction");
        let mut scene = Scene::new(vec![p], ARENA, ARENA).expect("arena admits the particle");
        for _ in 0..5 {
            scene.step().expect("step should not fail");
            let p = &scene.particles[0];
            prop_assert!(p.pos.x >= p.radius - 1e-6 && p.pos.x <= ARENA - p.radius + 1e-6);
            prop_assert!(p.pos.y >= p.radius - 1e-6 && p.pos.y <= ARENA - p.radius + 1e-6);
        }
    }
}
