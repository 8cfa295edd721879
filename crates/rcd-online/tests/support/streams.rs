// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rcd_core::Instance;

/// Two-feature stream whose label is the sign of the first feature,
/// flipped while `concepts[segment]` is odd.
pub fn alternating_sign_stream(seed: u64, segment_len: usize, concepts: &[u8]) -> Vec<Instance> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut stream = Vec::with_capacity(segment_len * concepts.len());
    for &concept in concepts {
        for _ in 0..segment_len {
            let x: f64 = rng.gen_range(-1.0..1.0);
            let y: f64 = rng.gen_range(-1.0..1.0);
            let positive = usize::from(x > 0.0);
            let label = if concept % 2 == 0 { positive } else { 1 - positive };
            stream.push(Instance::new(vec![x, y], label));
        }
    }
    stream
}
