// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use rcd_core::{ResizePolicy, WindowConfig};
use rcd_online::{DynamicWindowEvaluator, WindowedEvaluator};

struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn next_u8(&mut self) -> u8 {
        let value = self.data.get(self.offset).copied().unwrap_or(0);
        self.offset = self.offset.saturating_add(1);
        value
    }

    fn exhausted(&self) -> bool {
        self.offset >= self.data.len()
    }
}

fn bounded(seed: u8, min: usize, max: usize) -> usize {
    min + usize::from(seed) % (max - min + 1)
}

fn build_policy(seed: u8) -> ResizePolicy {
    match seed % 3 {
        0 => ResizePolicy::ErrorDelta,
        1 => ResizePolicy::ThresholdedErrorDelta,
        _ => ResizePolicy::ThreeWayCandidate,
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = ByteCursor::new(data);

    let default_size = bounded(cursor.next_u8(), 0, 64);
    let config = WindowConfig {
        default_size,
        increment: bounded(cursor.next_u8(), 0, 8),
        min_size: bounded(cursor.next_u8(), 0, 64),
        resize_policy: build_policy(cursor.next_u8()),
        decision_threshold: f64::from(cursor.next_u8()) / 255.0 - 0.5,
        resize_enabled: cursor.next_u8() & 1 == 0,
        ..WindowConfig::default()
    };

    let Ok(mut evaluator) = DynamicWindowEvaluator::new(config) else {
        return;
    };

    while !cursor.exhausted() {
        let op = cursor.next_u8();
        match op % 8 {
            0 => {
                let index = usize::from(cursor.next_u8() % 16);
                let prior = f64::from(cursor.next_u8()) / 255.0;
                let size = bounded(cursor.next_u8(), 0, 128);
                evaluator.add_model(index, prior, size);
            }
            1 => evaluator.remove_model(usize::from(cursor.next_u8() % 16)),
            2 => {
                evaluator.add(f64::from(cursor.next_u8()) / 255.0);
                assert!(evaluator.ring_len() <= evaluator.capacity());
            }
            _ => {
                evaluator.add_correctness(op & 0x10 != 0);
                assert!(evaluator.ring_len() <= evaluator.capacity());
            }
        }

        for index in evaluator.tracked_indices() {
            let size = evaluator
                .window_size(index)
                .expect("tracked index must report a size");
            assert!(size >= evaluator.config().min_size);
            let estimation = evaluator
                .estimation(index)
                .expect("tracked index must estimate");
            assert!((0.0..=1.0).contains(&estimation));
        }
    }
});
