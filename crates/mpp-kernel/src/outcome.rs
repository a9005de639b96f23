use mpp_core::MppError;

/// Result of asking a kernel (or proposer) for a proposal.
///
/// `NoChange` is an ordinary rejection and never aborts a chain. `Fatal`
/// carries an abnormal failure that must reach the caller.
#[derive(Debug)]
#[must_use]
pub enum ProposalOutcome<T> {
    /// Nothing was proposed (no candidate, proposer declined, degenerate geometry).
    NoChange,
    /// A new state was proposed.
    Proposed(T),
    /// An internal failure occurred.
    Fatal(MppError),
}

impl<T> ProposalOutcome<T> {
    /// Whether the outcome is `NoChange`.
    pub fn is_no_change(&self) -> bool {
        matches!(self, ProposalOutcome::NoChange)
    }

    /// Whether the outcome is `Proposed`.
    pub fn is_proposed(&self) -> bool {
        matches!(self, ProposalOutcome::Proposed(_))
    }

    /// Whether the outcome is `Fatal`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProposalOutcome::Fatal(_))
    }

    /// The proposed value, discarding the distinction between the other cases.
    pub fn proposed(self) -> Option<T> {
        match self {
            ProposalOutcome::Proposed(value) => Some(value),
            _ => None,
        }
    }

    /// Converts to a `Result` so fatal errors can be propagated with `?`.
    pub fn into_result(self) -> Result<Option<T>, MppError> {
        match self {
            ProposalOutcome::NoChange => Ok(None),
            ProposalOutcome::Proposed(value) => Ok(Some(value)),
            ProposalOutcome::Fatal(err) => Err(err),
        }
    }

    /// Maps the proposed value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ProposalOutcome<U> {
        match self {
            ProposalOutcome::NoChange => ProposalOutcome::NoChange,
            ProposalOutcome::Proposed(value) => ProposalOutcome::Proposed(f(value)),
            ProposalOutcome::Fatal(err) => ProposalOutcome::Fatal(err),
        }
    }
}

impl<T> From<Result<Option<T>, MppError>> for ProposalOutcome<T> {
    fn from(result: Result<Option<T>, MppError>) -> Self {
        match result {
            Ok(Some(value)) => ProposalOutcome::Proposed(value),
            Ok(None) => ProposalOutcome::NoChange,
            Err(err) => ProposalOutcome::Fatal(err),
        }
    }
}
