//! Committee quorum rule
//!
//! Committee approval is unanimous: a single rejection decides the
//! application, full approval needs every active member to approve, and
//! an empty committee never approves.

use serde::Serialize;
use std::fmt;

use crate::core::status::VoteStatus;

/// Aggregate outcome of a committee's votes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuorumOutcome {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for QuorumOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuorumOutcome::Pending => write!(f, "pending"),
            QuorumOutcome::Approved => write!(f, "approved"),
            QuorumOutcome::Rejected => write!(f, "rejected"),
        }
    }
}

/// Vote counts plus the outcome they imply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QuorumSummary {
    pub total: usize,
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
}

impl QuorumSummary {
    pub fn from_votes<I>(votes: I) -> Self
    where
        I: IntoIterator<Item = VoteStatus>,
    {
        let mut summary = QuorumSummary::default();
        for vote in votes {
            summary.total += 1;
            match vote {
                VoteStatus::Approved => summary.approved += 1,
                VoteStatus::Rejected => summary.rejected += 1,
                VoteStatus::Pending => summary.pending += 1,
            }
        }
        summary
    }

    pub fn outcome(&self) -> QuorumOutcome {
        if self.rejected > 0 {
            QuorumOutcome::Rejected
        } else if self.total > 0 && self.approved == self.total {
            QuorumOutcome::Approved
        } else {
            QuorumOutcome::Pending
        }
    }
}

/// Tally the votes of the active committee assignments for one application
pub fn tally<I>(votes: I) -> QuorumOutcome
where
    I: IntoIterator<Item = VoteStatus>,
{
    QuorumSummary::from_votes(votes).outcome()
}
