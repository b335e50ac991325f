use strand_model::Stage;
use tokio::time::Instant;

/// Partial outputs of stages A and B.
///
/// Failures do not land here: they go to the run's shared error queue, where
/// the first one received supersedes whatever this record holds.
#[derive(Debug)]
pub(super) struct StageRecord<A, B> {
    a: Option<A>,
    b: Option<B>,
    deadline: Instant,
}

impl<A, B> StageRecord<A, B> {
    pub(super) fn new(deadline: Instant) -> Self {
        Self {
            a: None,
            b: None,
            deadline,
        }
    }

    #[inline]
    pub(super) fn has_a(&self) -> bool {
        self.a.is_some()
    }

    #[inline]
    pub(super) fn has_b(&self) -> bool {
        self.b.is_some()
    }

    pub(super) fn set_a(&mut self, value: A) {
        self.a = Some(value);
    }

    pub(super) fn set_b(&mut self, value: B) {
        self.b = Some(value);
    }

    #[inline]
    pub(super) fn is_complete(&self) -> bool {
        self.has_a() && self.has_b()
    }

    /// Stages still outstanding, for diagnostics.
    pub(super) fn missing(&self) -> Vec<Stage> {
        let mut missing = Vec::with_capacity(2);
        if !self.has_a() {
            missing.push(Stage::A);
        }
        if !self.has_b() {
            missing.push(Stage::B);
        }
        missing
    }

    #[inline]
    pub(super) fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Both outputs, only once both are present.
    pub(super) fn into_pair(self) -> Option<(A, B)> {
        Some((self.a?, self.b?))
    }
}
