//! One-shot readiness for detectors whose resources arrive asynchronously (a model
//! downloaded or compiled on another thread).
//!
//! [readiness] returns a pair: the loader keeps the [ReadySignal] and resolves it exactly
//! once, the detector keeps the [Readiness] and blocks on it, with a timeout, from
//! `initialize()`. Nothing polls.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::DetectorError;

type Outcome = Result<(), String>;

pub struct ReadySignal {
    sender: Sender<Outcome>,
}

impl ReadySignal {
    pub fn succeed(self) {
        // The waiting side may already be gone; nobody is left to tell.
        let _ = self.sender.send(Ok(()));
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.sender.send(Err(reason.into()));
    }
}

pub struct Readiness {
    receiver: Receiver<Outcome>,
    outcome: Option<Result<(), DetectorError>>,
}

pub fn readiness() -> (ReadySignal, Readiness) {
    let (sender, receiver) = bounded(1);
    (
        ReadySignal { sender },
        Readiness {
            receiver,
            outcome: None,
        },
    )
}

/// A signal dropped without resolving counts as a failure.
fn settle(outcome: Result<Outcome, ()>) -> Result<(), DetectorError> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(DetectorError::InitializationFailed(reason)),
        Err(()) => Err(DetectorError::InitializationFailed(
            "readiness signal dropped before resolving".into(),
        )),
    }
}

impl Readiness {
    /// Block until the signal resolves or `timeout` elapses. Once resolved, the outcome
    /// is remembered and returned by every later call.
    pub fn wait(&mut self, timeout: Duration) -> Result<(), DetectorError> {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        let outcome = match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => settle(Ok(outcome)),
            Err(RecvTimeoutError::Timeout) => return Err(DetectorError::ReadyTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => settle(Err(())),
        };
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Non-blocking check; `false` while the signal is pending or if it failed.
    pub fn is_ready(&mut self) -> bool {
        if self.outcome.is_none() {
            match self.receiver.try_recv() {
                Ok(outcome) => self.outcome = Some(settle(Ok(outcome))),
                Err(TryRecvError::Disconnected) => self.outcome = Some(settle(Err(()))),
                Err(TryRecvError::Empty) => {}
            }
        }
        matches!(self.outcome, Some(Ok(())))
    }
}
