//! Completion detection as a pure state machine.
//!
//! The page gives no "done" signal, so completion is inferred: while a stop
//! control is visible the response is still generating; once it is gone the
//! candidate region's text length must hold still for `stability_threshold`
//! consecutive polls. The deadline is checked before anything else on every
//! tick.

use crate::dom::{CandidateRegion, Observation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Generating,
    Settling,
    Complete,
    TimedOut,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::TimedOut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorSettings {
    pub stability_threshold: u32,
    pub max_wait_ms: u64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            stability_threshold: 3,
            max_wait_ms: 120000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionState {
    pub elapsed_ms: u64,
    pub last_observed_length: usize,
    pub stable_count: u32,
    pub phase: Phase,
}

/// What the driver should do after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Continue,
    Completed(CandidateRegion),
    TimedOut { elapsed_ms: u64 },
}

impl DetectionState {
    pub fn new() -> Self {
        Self {
            elapsed_ms: 0,
            last_observed_length: 0,
            stable_count: 0,
            phase: Phase::Generating,
        }
    }

    /// Advance one poll. Terminal states are returned unchanged.
    pub fn tick(
        self,
        observation: &Observation,
        elapsed_ms: u64,
        settings: &DetectorSettings,
    ) -> (DetectionState, Transition) {
        match self.phase {
            Phase::Complete | Phase::TimedOut => return (self, Transition::Continue),
            Phase::Generating | Phase::Settling => {}
        }

        let mut next = DetectionState { elapsed_ms, ..self };

        if elapsed_ms > settings.max_wait_ms {
            next.phase = Phase::TimedOut;
            return (next, Transition::TimedOut { elapsed_ms });
        }

        if observation.generating {
            next.phase = Phase::Generating;
            next.stable_count = 0;
            next.last_observed_length = 0;
            return (next, Transition::Continue);
        }

        next.phase = Phase::Settling;
        let Some(candidate) = &observation.candidate else {
            next.stable_count = 0;
            return (next, Transition::Continue);
        };

        if candidate.text_length == next.last_observed_length {
            next.stable_count += 1;
        } else {
            next.stable_count = 1;
            next.last_observed_length = candidate.text_length;
        }

        if next.stable_count >= settings.stability_threshold {
            next.phase = Phase::Complete;
            return (next, Transition::Completed(candidate.clone()));
        }

        (next, Transition::Continue)
    }
}

impl Default for DetectionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(length: usize) -> Observation {
        Observation::settled(CandidateRegion {
            selector: ".markdown".into(),
            index: 0,
            text_length: length,
        })
    }

    fn run(observations: &[Observation], settings: &DetectorSettings) -> Vec<(DetectionState, Transition)> {
        let mut state = DetectionState::new();
        let mut out = Vec::new();
        for (i, obs) in observations.iter().enumerate() {
            let (next, transition) = state.tick(obs, (i as u64 + 1) * 1000, settings);
            out.push((next.clone(), transition));
            state = next;
        }
        out
    }

    #[test]
    fn completes_on_third_equal_poll_never_earlier() {
        let settings = DetectorSettings::default();
        let steps = run(
            &[
                Observation::generating(),
                region(1500),
                region(1500),
                region(1500),
            ],
            &settings,
        );

        assert_eq!(steps[1].0.stable_count, 1);
        assert_eq!(steps[1].1, Transition::Continue);
        assert_eq!(steps[2].0.stable_count, 2);
        assert_eq!(steps[2].1, Transition::Continue);
        assert_eq!(steps[3].0.phase, Phase::Complete);
        assert!(matches!(steps[3].1, Transition::Completed(ref r) if r.text_length == 1500));
    }

    #[test]
    fn growth_restarts_the_stability_window() {
        let settings = DetectorSettings::default();
        let steps = run(
            &[region(1200), region(1200), region(1300), region(1300), region(1300)],
            &settings,
        );

        assert_eq!(steps[2].0.stable_count, 1);
        assert_eq!(steps[2].0.last_observed_length, 1300);
        assert_eq!(steps[3].1, Transition::Continue);
        assert_eq!(steps[4].0.phase, Phase::Complete);
    }

    #[test]
    fn regeneration_resets_counters() {
        let settings = DetectorSettings::default();
        let steps = run(
            &[region(1200), region(1200), Observation::generating(), region(1200)],
            &settings,
        );

        assert_eq!(steps[1].0.stable_count, 2);
        assert_eq!(steps[2].0.phase, Phase::Generating);
        assert_eq!(steps[2].0.stable_count, 0);
        assert_eq!(steps[2].0.last_observed_length, 0);
        assert_eq!(steps[3].0.stable_count, 1);
        assert_eq!(steps[3].1, Transition::Continue);
    }

    #[test]
    fn timeout_wins_even_when_stability_is_one_poll_away() {
        let settings = DetectorSettings {
            stability_threshold: 3,
            max_wait_ms: 2500,
        };
        let steps = run(&[region(1200), region(1200), region(1200)], &settings);

        assert_eq!(steps[1].0.stable_count, 2);
        assert_eq!(steps[2].0.phase, Phase::TimedOut);
        assert_eq!(steps[2].1, Transition::TimedOut { elapsed_ms: 3000 });
    }

    #[test]
    fn timeout_applies_while_generating() {
        let settings = DetectorSettings {
            stability_threshold: 3,
            max_wait_ms: 1500,
        };
        let steps = run(&[Observation::generating(), Observation::generating()], &settings);

        assert_eq!(steps[0].0.phase, Phase::Generating);
        assert_eq!(steps[1].1, Transition::TimedOut { elapsed_ms: 2000 });
    }

    #[test]
    fn missing_region_breaks_the_streak() {
        let settings = DetectorSettings::default();
        let steps = run(
            &[region(1200), region(1200), Observation::empty(), region(1200), region(1200)],
            &settings,
        );

        assert_eq!(steps[2].0.phase, Phase::Settling);
        assert_eq!(steps[2].0.stable_count, 0);
        assert_eq!(steps[2].0.last_observed_length, 1200);
        assert_eq!(steps[3].0.stable_count, 1);
        assert_eq!(steps[4].1, Transition::Continue);
    }

    #[test]
    fn terminal_states_do_not_move() {
        let settings = DetectorSettings::default();
        let done = DetectionState {
            elapsed_ms: 5000,
            last_observed_length: 1200,
            stable_count: 3,
            phase: Phase::Complete,
        };

        let (after, transition) = done.clone().tick(&Observation::generating(), 999_000, &settings);
        assert_eq!(after, done);
        assert_eq!(transition, Transition::Continue);
    }
}
