use crate::simulation::Simulation;
use ideal_gas_common::TimeStepChange;
use log::info;
use std::iter::Peekable;
use std::vec::IntoIter;

/// Time step changes ordered by the step they take effect at.
///
/// Changes sharing a step keep their config order, so the last one listed wins.
pub struct TimeStepSchedule {
    pending: Peekable<IntoIter<TimeStepChange>>,
}

impl TimeStepSchedule {
    pub fn new(mut changes: Vec<TimeStepChange>) -> Self {
        changes.sort_by_key(|change| change.step);
        Self { pending: changes.into_iter().peekable() }
    }

    /// Applies every change due before step `step` (zero-based) runs, including any that were
    /// scheduled for earlier steps. Returns how many were applied.
    pub fn apply_due(&mut self, step: u32, sim: &mut Simulation) -> usize {
        let mut applied = 0;
        while let Some(change) = self.pending.next_if(|change| change.step <= step) {
            info!("Step {}: time step {} -> {}", step, sim.time_step(), change.time_step);
            sim.set_time_step(change.time_step);
            applied += 1;
        }
        applied
    }
}
