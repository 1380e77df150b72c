//! Virtual-deadline tuning.
//!
//! [`tune_mode`] tightens the rank-`m` virtual deadlines of a core's
//! instances until the demand of the `(m, m + 1)` mode switch fits the
//! supply in every window up to the search bound. [`tune_system`] drives it
//! from the highest rank down and adds the per-rank capacity check.
//!
//! Both operate on a slice of mutable instance references. Restoring the
//! deadlines after a failure is the caller's job (see
//! [`crate::cores::DeadlineSnapshot`]).

use tracing::trace;

use crate::UTILIZATION_EPSILON;
use crate::cores::AdmissionSettings;
use crate::dbf::{
    marginal_mode_demand, signed, total_baseline_demand, total_mode_demand, window_bound,
};
use crate::error::AdmissionRejection;
use crate::task::{TaskInstance, Ticks};

fn view<'a>(affected: &'a [&mut TaskInstance]) -> impl Iterator<Item = &'a TaskInstance> + 'a {
    affected.iter().map(|t| &**t)
}

/// Tune rank `m` for every instance in `affected`.
///
/// Only instances whose criticality is above `m` are tuned. At rank 0 the
/// baseline demand is checked too, and rank-0 tightenings are undone in
/// reverse order when they overload the baseline. Ranks above 0 that are the
/// top rank have no switch to analyse and succeed immediately.
///
/// # Errors
///
/// Returns the rejection reason when no assignment of virtual deadlines
/// satisfies every window.
pub fn tune_mode(
    affected: &mut [&mut TaskInstance],
    m: usize,
    top_rank: usize,
    window_cap: Ticks,
) -> Result<(), AdmissionRejection> {
    // Rank 0 owes the baseline scan even when it is also the top rank.
    if m >= top_rank && m > 0 {
        return Ok(());
    }
    let m_prime = m + 1;

    let mut tunable = vec![false; affected.len()];
    for (inst, slot) in affected.iter_mut().zip(tunable.iter_mut()) {
        if inst.criticality() <= m {
            continue;
        }
        let d = inst.virtual_deadline_at(m).min(inst.virtual_deadline_at(m_prime));
        let floor = inst.wcet_at(m);
        if d < floor {
            return Err(AdmissionRejection::DemandUnresolvable { rank: m });
        }
        inst.set_virtual_deadline_at(m, d);
        *slot = d > floor;
    }

    // Rank-0 tightenings, most recent last.
    let mut tightened: Vec<usize> = Vec::new();

    'restart: loop {
        let l_max = signed(window_bound(view(affected), m, window_cap));

        for l in 0..=l_max {
            if m == 0 && total_baseline_demand(view(affected), l) > l {
                let idx = tightened.pop().ok_or(AdmissionRejection::BaselineOverload)?;
                if let (Some(inst), Some(slot)) = (affected.get_mut(idx), tunable.get_mut(idx)) {
                    let relaxed = inst.virtual_deadline_at(0).saturating_add(1);
                    inst.set_virtual_deadline_at(0, relaxed);
                    *slot = false;
                    trace!(task = %inst.id(), vd = relaxed, window = l, "relaxed rank-0 deadline");
                }
                continue 'restart;
            }

            if total_mode_demand(view(affected), m, l) > l {
                let idx = select_target(affected, &tunable, m, l)
                    .ok_or(AdmissionRejection::DemandUnresolvable { rank: m })?;
                if let (Some(inst), Some(slot)) = (affected.get_mut(idx), tunable.get_mut(idx)) {
                    let tightened_vd = inst.virtual_deadline_at(m).saturating_sub(1);
                    inst.set_virtual_deadline_at(m, tightened_vd);
                    if tightened_vd <= inst.wcet_at(m) {
                        *slot = false;
                    }
                    trace!(task = %inst.id(), rank = m, vd = tightened_vd, window = l, "tightened deadline");
                }
                if m == 0 {
                    tightened.push(idx);
                }
                continue 'restart;
            }
        }

        return Ok(());
    }
}

/// Tunable instance with the largest marginal demand at window `l`.
///
/// Ties keep the earliest instance; with no positive marginal demand the
/// first tunable instance is chosen.
fn select_target(
    affected: &[&mut TaskInstance],
    tunable: &[bool],
    m: usize,
    l: i64,
) -> Option<usize> {
    let mut target = None;
    let mut best = 0i64;
    for (idx, (inst, &is_tunable)) in affected.iter().zip(tunable).enumerate() {
        if !is_tunable {
            continue;
        }
        if target.is_none() {
            target = Some(idx);
        }
        let delta = marginal_mode_demand(inst, m, l);
        if delta > best {
            best = delta;
            target = Some(idx);
        }
    }
    target
}

/// Re-tune every rank of a core holding `affected`.
///
/// The candidate instance is the last element of `affected`; `utilization`
/// is the core's committed per-rank utilization without it. Every instance is
/// reset to its nominal deadlines first.
///
/// # Errors
///
/// Returns the first rank at which the capacity check or tuning fails.
pub fn tune_system(
    affected: &mut [&mut TaskInstance],
    utilization: &[f64],
    levels: usize,
    settings: &AdmissionSettings,
) -> Result<(), AdmissionRejection> {
    for inst in affected.iter_mut() {
        inst.reset_virtual_deadline();
    }
    let top_rank = levels.saturating_sub(1);

    for rank in (0..levels).rev() {
        if let Some(candidate) = affected.last() {
            let task = candidate.task();
            if settings.utilization_policy.counts(task, rank) {
                let committed = utilization.get(rank).copied().unwrap_or(0.0);
                if committed + task.utilization(rank) > 1.0 + UTILIZATION_EPSILON {
                    return Err(AdmissionRejection::CapacityExceeded { rank });
                }
            }
        }
        tune_mode(affected, rank, top_rank, settings.window_cap)?;
    }
    Ok(())
}
