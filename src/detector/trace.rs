//! Opt-in tracing of detector decisions.
//!
//! Every decision is also emitted through `log::trace!`; a [TraceHook] is for callers that
//! want the structured values (a tuning UI, a test) without configuring a logger.

use crate::detector::Algorithm;

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// Frame energy below the voicing threshold.
    Silence { rms: f64 },
    /// Neither estimator produced a candidate.
    Unvoiced,
    /// Candidate outside the configured frequency range.
    OutOfRange { frequency: f64 },
    OctaveCorrected { from: f64, to: f64 },
    NewNote { frequency: f64 },
    Detected {
        raw: f64,
        smoothed: f64,
        clarity: f64,
        algorithm: Algorithm,
    },
}

pub type TraceHook = Box<dyn FnMut(&TraceEvent) + Send>;

pub(crate) fn emit(hook: &mut Option<TraceHook>, event: TraceEvent) {
    log::trace!("{:?}", event);
    if let Some(hook) = hook.as_mut() {
        hook(&event);
    }
}
