// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Benchmarks live under `benches/`.
pub fn crate_name() -> &'static str {
    "rcd-bench"
}
