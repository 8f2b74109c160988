//! Compare-and-swap commit attempts.
//!
//! Appending to a remote tree reads `(root, generation)`, builds a new root
//! and commits it under that generation. When another writer got there
//! first, the commit is rejected and the whole read-build-commit cycle
//! starts over. The policy here bounds how often that happens for a single
//! article.

/// Default number of commit cycles per article.
pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 3;

/// Bound on compare-and-swap commit cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    max_attempts: u32,
}

impl CommitPolicy {
    /// Create a policy allowing `max_attempts` cycles (at least one).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Maximum number of cycles.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Start counting attempts for one article.
    pub fn attempts(&self) -> CommitAttempts {
        CommitAttempts {
            max: self.max_attempts,
            used: 0,
        }
    }
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COMMIT_ATTEMPTS)
    }
}

/// Attempt counter for one article's commit.
///
/// ```
/// use paperfeed_core::CommitPolicy;
///
/// let mut attempts = CommitPolicy::new(2).attempts();
/// assert_eq!(attempts.next_attempt(), Some(1));
/// assert_eq!(attempts.next_attempt(), Some(2));
/// assert_eq!(attempts.next_attempt(), None);
/// assert!(attempts.is_exhausted());
/// ```
#[derive(Debug, Clone)]
pub struct CommitAttempts {
    max: u32,
    used: u32,
}

impl CommitAttempts {
    /// Claim the next attempt, numbered from 1. `None` once exhausted.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.used >= self.max {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }

    /// Number of attempts claimed so far.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Whether every attempt has been claimed.
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        assert_eq!(CommitPolicy::default().max_attempts(), DEFAULT_COMMIT_ATTEMPTS);
    }

    #[test]
    fn zero_is_clamped_to_one() {
        let mut attempts = CommitPolicy::new(0).attempts();
        assert_eq!(attempts.next_attempt(), Some(1));
        assert_eq!(attempts.next_attempt(), None);
    }

    #[test]
    fn attempts_are_bounded() {
        let mut attempts = CommitPolicy::new(3).attempts();
        let claimed: Vec<_> = std::iter::from_fn(|| attempts.next_attempt()).collect();
        assert_eq!(claimed, vec![1, 2, 3]);
        assert_eq!(attempts.used(), 3);
        assert!(attempts.is_exhausted());
    }

    #[test]
    fn counters_are_independent_per_article() {
        let policy = CommitPolicy::new(2);
        let mut first = policy.attempts();
        first.next_attempt();
        first.next_attempt();

        let mut second = policy.attempts();
        assert!(!second.is_exhausted());
        assert_eq!(second.next_attempt(), Some(1));
    }
}
