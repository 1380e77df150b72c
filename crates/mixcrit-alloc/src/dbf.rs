//! Demand-bound functions for virtual-deadline tuning.
//!
//! Every function here is pure: it reads the period, WCET vector and current
//! virtual deadlines of an instance and returns an execution demand. Windows
//! are signed so that `dbf(l - 1)` at `l = 0` needs no special casing; a
//! negative window always has zero demand.
//!
//! Two flavours exist:
//!
//! - [`baseline_demand`]: the least-critical mode, comparing the virtual
//!   deadline at rank 0 against the window.
//! - [`mode_demand`]: the carry-over demand of an instance across a switch
//!   from mode `m` to mode `m + 1`, where jobs released before the switch may
//!   already have consumed part of their rank-`m` budget.

use crate::task::{TaskInstance, Ticks};

/// Sentinel cap on the window search bound.
pub const DEFAULT_WINDOW_CAP: Ticks = 1_000_000;

pub(crate) fn signed(value: Ticks) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Number of job releases whose relative deadline `offset` fits inside `window`.
fn releases(window: i64, offset: i64, period: i64) -> i64 {
    window
        .saturating_sub(offset)
        .div_euclid(period)
        .saturating_add(1)
        .max(0)
}

/// Demand of `instance` in the least-critical mode within `window`.
pub fn baseline_demand(instance: &TaskInstance, window: i64) -> i64 {
    if window < 0 {
        return 0;
    }
    let period = signed(instance.period()).max(1);
    let vd0 = signed(instance.virtual_deadline_at(0));
    let wcet0 = signed(instance.wcet_at(0));
    releases(window, vd0, period).saturating_mul(wcet0).max(0)
}

/// Demand of `instance` within `window` after a switch from mode `m` to
/// mode `m + 1`.
///
/// Instances not active in mode `m + 1` contribute nothing.
pub fn mode_demand(instance: &TaskInstance, m: usize, window: i64) -> i64 {
    let m_prime = m.saturating_add(1);
    if window < 0 || !instance.task().is_active_at(m_prime) {
        return 0;
    }

    let period = signed(instance.period()).max(1);
    let vd_m = signed(instance.virtual_deadline_at(m));
    let vd_mp = signed(instance.virtual_deadline_at(m_prime));
    let wcet_m = signed(instance.wcet_at(m));
    let wcet_mp = signed(instance.wcet_at(m_prime));
    let gap = vd_mp.saturating_sub(vd_m);

    let full = releases(window, gap, period).saturating_mul(wcet_mp);

    let x = window.rem_euclid(period);
    let done = if vd_mp > x && x >= gap {
        wcet_m
            .saturating_sub(x)
            .saturating_add(gap)
            .clamp(0, wcet_mp.max(0))
    } else {
        0
    };

    full.saturating_sub(done).max(0)
}

/// Increase of [`mode_demand`] between `window - 1` and `window`.
pub fn marginal_mode_demand(instance: &TaskInstance, m: usize, window: i64) -> i64 {
    mode_demand(instance, m, window).saturating_sub(mode_demand(instance, m, window.saturating_sub(1)))
}

/// Summed baseline demand of every instance.
pub fn total_baseline_demand<'a, I>(instances: I, window: i64) -> i64
where
    I: IntoIterator<Item = &'a TaskInstance>,
{
    instances
        .into_iter()
        .map(|t| baseline_demand(t, window))
        .fold(0i64, i64::saturating_add)
}

/// Summed `(m, m + 1)` demand of every instance.
pub fn total_mode_demand<'a, I>(instances: I, m: usize, window: i64) -> i64
where
    I: IntoIterator<Item = &'a TaskInstance>,
{
    instances
        .into_iter()
        .map(|t| mode_demand(t, m, window))
        .fold(0i64, i64::saturating_add)
}

/// Greatest common divisor.
pub fn gcd(mut a: Ticks, mut b: Ticks) -> Ticks {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Least common multiple, saturating at `Ticks::MAX`.
pub fn lcm(a: Ticks, b: Ticks) -> Ticks {
    if a == 0 || b == 0 {
        return 0;
    }
    (a / gcd(a, b)).saturating_mul(b)
}

/// Least common multiple of every period, saturating.
pub fn hyperperiod<I>(periods: I) -> Ticks
where
    I: IntoIterator<Item = Ticks>,
{
    periods.into_iter().fold(1, lcm)
}

/// Bound for one population: tasks, their analysis deadlines and their
/// utilization.
#[allow(clippy::cast_precision_loss, reason = "bounds are heuristics on tick counts")]
fn population_bound(entries: &[(Ticks, i64)], utilization: f64) -> f64 {
    let Some(max_deadline) = entries.iter().map(|&(_, d)| d).max() else {
        return 0.0;
    };
    let hyper = hyperperiod(entries.iter().map(|&(p, _)| p));
    let bound_hyper = hyper as f64 + max_deadline as f64;

    if utilization < 1.0 {
        let max_diff = entries
            .iter()
            .map(|&(p, d)| signed(p).saturating_sub(d))
            .max()
            .unwrap_or(0);
        let bound_density = utilization / (1.0 - utilization) * max_diff as f64;
        bound_hyper.min(bound_density)
    } else {
        bound_hyper
    }
}

/// Largest window that has to be checked for the rank pair `(m, m + 1)`.
///
/// Two populations are bounded separately: instances active in mode `m`
/// (deadline `vd[m]`, utilization at `m`) and instances active in mode
/// `m + 1` (deadline `vd[m + 1] - vd[m]`, utilization at `m + 1`). Each takes
/// the smaller of its hyperperiod bound and, below full utilization, its
/// density bound. The result is the larger of the two, clamped to
/// `[0, cap]`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "float-to-int casts saturate and the value is clamped first"
)]
pub fn window_bound<'a, I>(instances: I, m: usize, cap: Ticks) -> Ticks
where
    I: IntoIterator<Item = &'a TaskInstance>,
{
    let m_prime = m.saturating_add(1);
    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut low_util = 0.0;
    let mut high_util = 0.0;

    for t in instances {
        if t.task().is_active_at(m) {
            low.push((t.period(), signed(t.virtual_deadline_at(m))));
            low_util += t.task().utilization(m);
        }
        if t.task().is_active_at(m_prime) {
            let gap = signed(t.virtual_deadline_at(m_prime))
                .saturating_sub(signed(t.virtual_deadline_at(m)));
            high.push((t.period(), gap));
            high_util += t.task().utilization(m_prime);
        }
    }

    let bound = population_bound(&low, low_util).max(population_bound(&high, high_util));
    if bound.is_nan() || bound <= 0.0 {
        return 0;
    }
    // `as` saturates for out-of-range floats.
    (bound as Ticks).min(cap)
}
