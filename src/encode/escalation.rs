//! Retry-with-escalation over an ordered list of configurations.
//!
//! The first configuration always runs. Each later one carries a predicate
//! over the previous attempt's diagnostics and only runs when that predicate
//! accepts them; otherwise the previous failure is final. No configuration is
//! attempted twice and none is skipped.

use std::future::Future;

/// A configuration that may follow a failed attempt.
pub struct Fallback<C, D> {
    pub config: C,
    /// Decides, from the previous failure, whether this fallback applies
    pub when: fn(&D) -> bool,
}

/// Ordered escalation chain.
pub struct EscalationChain<C, D> {
    initial: C,
    fallbacks: Vec<Fallback<C, D>>,
}

/// Result of running a chain.
#[derive(Debug)]
pub struct Escalated<C, T, D> {
    /// Configuration of the last attempt made
    pub config: C,
    /// Number of attempts made, at least 1
    pub attempts: usize,
    pub result: Result<T, D>,
}

impl<C: Clone, D> EscalationChain<C, D> {
    pub fn new(initial: C) -> Self {
        Self {
            initial,
            fallbacks: Vec::new(),
        }
    }

    /// Appends a fallback tried after the current last stage fails with diagnostics accepted by `when`.
    pub fn then(mut self, config: C, when: fn(&D) -> bool) -> Self {
        self.fallbacks.push(Fallback { config, when });
        self
    }

    pub fn configs(&self) -> impl Iterator<Item = &C> {
        std::iter::once(&self.initial).chain(self.fallbacks.iter().map(|f| &f.config))
    }

    /// Runs `attempt` for the initial configuration and then for each
    /// fallback whose predicate accepts the preceding failure.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Escalated<C, T, D>
    where
        F: FnMut(C) -> Fut,
        Fut: Future<Output = Result<T, D>>,
    {
        let mut config = self.initial.clone();
        let mut attempts = 1;
        let mut result = attempt(config.clone()).await;

        for fallback in &self.fallbacks {
            let diagnostics = match &result {
                Ok(_) => break,
                Err(d) => d,
            };
            if !(fallback.when)(diagnostics) {
                break;
            }
            config = fallback.config.clone();
            attempts += 1;
            result = attempt(config.clone()).await;
        }

        Escalated {
            config,
            attempts,
            result,
        }
    }
}
