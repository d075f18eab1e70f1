//! Deterministic RNG utilities for reproducible tests.

use kinodyn_traj::{ContactPlan, ContactRecord};
use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Create a deterministic `ChaCha8Rng` from a seed.
///
/// All test randomization should go through this to ensure reproducibility.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Random valid contact plan covering `[0, horizon]`.
///
/// Every end-effector gets 1 to 4 contacts, the first starting at 0 and the
/// last ending at `horizon`. About a quarter of the swing gaps are closed so
/// consecutive contacts abut. Contact heights lie in `[0, 0.05]`.
pub fn random_contact_plan(
    rng: &mut ChaCha8Rng,
    num_end_effectors: usize,
    horizon: f64,
) -> ContactPlan {
    let records = (0..num_end_effectors)
        .map(|_| {
            let n_contacts: usize = rng.gen_range(1..=4);
            let mut bounds: Vec<f64> = (0..2 * n_contacts - 2)
                .map(|_| rng.gen_range(0.05..0.95) * horizon)
                .collect();
            bounds.sort_by(f64::total_cmp);
            bounds.insert(0, 0.0);
            bounds.push(horizon);
            // bounds[2k - 1]..bounds[2k] is the k-th swing gap.
            for k in 1..n_contacts {
                if rng.gen_bool(0.25) {
                    bounds[2 * k] = bounds[2 * k - 1];
                }
            }

            bounds
                .chunks(2)
                .map(|pair| {
                    let position = Vector3::new(
                        rng.gen_range(-0.3..0.3),
                        rng.gen_range(-0.2..0.2),
                        rng.gen_range(0.0..0.05),
                    );
                    ContactRecord::new(pair[0], pair[1], position)
                })
                .collect::<Vec<_>>()
        })
        .collect();
    ContactPlan::new(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
