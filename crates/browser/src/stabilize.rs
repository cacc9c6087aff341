//! Reply stabilization.
//!
//! A streaming page exposes no "done" signal, so completion is inferred
//! by sampling: once the newest assistant message has stopped changing
//! for a configured number of consecutive polls, the reply is considered
//! finished. The state here is pure; the driver owns the clock and the
//! tick budget.

use serde::Deserialize;

/// A non-inline image reference captured from the reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub alt: String,
}

/// What one poll tick observed: how many assistant messages exist, the
/// newest one's converted text, and its image references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedSample {
    pub count: usize,
    pub text: String,
    pub images: Vec<ImageRef>,
}

/// Outcome of feeding one sample to the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The message count has not moved past the pre-send baseline.
    AwaitingReply,
    /// A reply exists but is still changing (or is still empty).
    Streaming,
    /// The reply repeated unchanged often enough to count as complete.
    Stable,
}

/// Debounce state for one send operation.
#[derive(Debug)]
pub struct StabilizeState {
    baseline_count: usize,
    threshold: u32,
    last: Option<ObservedSample>,
    streak: u32,
}

impl StabilizeState {
    /// `baseline_count` is the assistant message count captured before the
    /// send; only samples beyond it are considered a reply.
    pub fn new(baseline_count: usize, threshold: u32) -> Self {
        Self {
            baseline_count,
            threshold,
            last: None,
            streak: 0,
        }
    }

    pub fn observe(&mut self, sample: &ObservedSample) -> Verdict {
        if sample.count <= self.baseline_count {
            return Verdict::AwaitingReply;
        }

        let unchanged = self
            .last
            .as_ref()
            .is_some_and(|last| last.text == sample.text && last.images == sample.images);

        if unchanged && !sample.text.is_empty() {
            self.streak += 1;
            if self.streak >= self.threshold {
                return Verdict::Stable;
            }
        } else {
            self.streak = 0;
            self.last = Some(sample.clone());
        }
        Verdict::Streaming
    }

    /// Last recorded reply content, for timeout reporting. Empty when no
    /// reply was ever observed.
    pub fn partial(&self) -> (String, Vec<ImageRef>) {
        match &self.last {
            Some(sample) => (sample.text.clone(), sample.images.clone()),
            None => (String::new(), Vec::new()),
        }
    }
}
