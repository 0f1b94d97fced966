use crate::core::BrowserTrait;
use crate::detect::state::{DetectionState, DetectorSettings, Transition};
use crate::diag;
use crate::diagnostics::DiagnosticsLog;
use crate::dom::{CandidateRegion, Observation, PayloadHeuristic, RegionObserver};
use crate::errors::{AutomationError, Result};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Drives [`DetectionState::tick`] at a fixed cadence against a live page.
pub struct CompletionPoller {
    pub poll_interval: Duration,
    pub settings: DetectorSettings,
}

impl CompletionPoller {
    pub fn new(poll_interval_ms: u64, settings: DetectorSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
            settings,
        }
    }

    pub async fn wait<B: BrowserTrait>(
        &self,
        browser: &B,
        tab: &B::TabHandle,
        generating_selectors: &[String],
        response_selectors: &[String],
        heuristic: &PayloadHeuristic,
        log: &dyn DiagnosticsLog,
    ) -> Result<CandidateRegion> {
        let started = Instant::now();
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;

        let mut state = DetectionState::new();
        loop {
            interval.tick().await;

            let observation = match RegionObserver::observe(
                browser,
                tab,
                generating_selectors,
                response_selectors,
                heuristic,
            )
            .await
            {
                Ok(observation) => observation,
                Err(e) => {
                    warn!(error = %e, "observation failed, treating as empty");
                    diag!(log, Warn, "observation failed", { "error": e.to_string() });
                    Observation::empty()
                }
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            let (next, transition) = state.tick(&observation, elapsed_ms, &self.settings);
            state = next;

            debug!(
                phase = ?state.phase,
                elapsed_ms,
                stable_count = state.stable_count,
                text_length = state.last_observed_length,
                "detector tick"
            );
            diag!(log, Debug, "detector tick", {
                "phase": state.phase,
                "elapsed_ms": elapsed_ms,
                "stable_count": state.stable_count,
                "text_length": state.last_observed_length,
                "candidate": observation.candidate,
            });
            if log.is_enabled() {
                if let Ok(value) = serde_json::to_value(&state) {
                    log.record_state("detection", value);
                }
            }

            match transition {
                Transition::Continue => continue,
                Transition::Completed(region) => {
                    info!(
                        selector = %region.selector,
                        text_length = region.text_length,
                        elapsed_ms,
                        "response settled"
                    );
                    diag!(log, Info, "response settled", {
                        "selector": region.selector,
                        "index": region.index,
                        "text_length": region.text_length,
                        "elapsed_ms": elapsed_ms,
                    });
                    return Ok(region);
                }
                Transition::TimedOut { elapsed_ms } => {
                    warn!(elapsed_ms, generating = observation.generating, "response timed out");
                    diag!(log, Error, "response timed out", {
                        "elapsed_ms": elapsed_ms,
                        "last_observed_length": state.last_observed_length,
                        "stable_count": state.stable_count,
                    });
                    return Err(AutomationError::ResponseTimeout { elapsed_ms });
                }
            }
        }
    }
}
