//! Energy integration
//!
//! The device only reports a PDU-wide kWh counter. Per-group and
//! per-outlet energy is integrated here from consecutive snapshots with
//! the trapezoidal rule.

use tracing::trace;

use crate::core::status::{Measurements, Status};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Carry energy forward from `prev` into `new`
///
/// Groups and outlets are matched by position; both snapshots must come
/// from the same device and have the same detail level.
pub fn integrate_energy(prev: &Status, new: &mut Status) {
    let elapsed_ms = (new.timestamp - prev.timestamp).num_milliseconds();
    // Clock went backwards: keep totals, add nothing
    let hours = elapsed_ms.max(0) as f64 / MS_PER_HOUR;

    for (prev, new) in prev.groups.iter().zip(new.groups.iter_mut()) {
        accumulate(&prev.measurements, &mut new.measurements, hours);
    }
    for (prev, new) in prev.outlets.iter().zip(new.outlets.iter_mut()) {
        accumulate(&prev.measurements, &mut new.measurements, hours);
    }

    trace!(hours, "Integrated energy");
}

fn accumulate(prev: &Measurements, new: &mut Measurements, hours: f64) {
    let mean_power = (prev.power() + new.power()) / 2.0; // W
    new.energy = prev.energy + mean_power * hours * 1e-3; // kWh
}
