use std::sync::{Arc, Mutex, MutexGuard};

use crate::aggregation::domain::aggregator::Aggregator;
use crate::aggregation::domain::identity_summary::IdentitySummary;
use crate::clustering::domain::clustering_session::{ClusteringSession, SessionSnapshot};
use crate::clustering::domain::identity::IdentityId;
use crate::pipeline::analysis_error::AnalysisError;

/// Handle to one identity registry, shareable between an analysis worker
/// and the thread that serves user commands.
///
/// At most one analysis run holds the registry at a time. While a run is
/// in flight, a second run and every user mutation (merge, relabel,
/// replace) are refused with [`AnalysisError::RunInProgress`]; reads are
/// still allowed and see the identities built so far.
///
/// The run flag lives under the same mutex as the registry, so a mutation
/// checks it and applies its change without a run starting in between.
#[derive(Clone)]
pub struct SharedSession {
    state: Arc<Mutex<SessionState>>,
}

struct SessionState {
    session: ClusteringSession,
    running: bool,
}

/// Marks a run in flight; dropping it releases the run lock, including on
/// early return or panic.
pub struct RunGuard {
    state: Arc<Mutex<SessionState>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        // A poisoned registry still has to give up the run flag.
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.running = false;
    }
}

impl SharedSession {
    pub fn new(session: ClusteringSession) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                session,
                running: false,
            })),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().map_or(false, |state| state.running)
    }

    /// Takes the run lock, or fails if another run already holds it.
    pub fn begin_run(&self) -> Result<RunGuard, AnalysisError> {
        let mut state = self.lock()?;
        if state.running {
            return Err(AnalysisError::RunInProgress);
        }
        state.running = true;
        Ok(RunGuard {
            state: self.state.clone(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionState>, AnalysisError> {
        self.state.lock().map_err(|_| AnalysisError::LockPoisoned)
    }

    /// Runs `f` with the registry locked. Used by the run that holds the
    /// run lock and for read-only access from anywhere.
    pub fn with_session<R>(
        &self,
        f: impl FnOnce(&mut ClusteringSession) -> R,
    ) -> Result<R, AnalysisError> {
        let mut state = self.lock()?;
        Ok(f(&mut state.session))
    }

    /// Like [`Self::with_session`], but refuses while a run holds the run
    /// lock. The flag is read under the registry mutex.
    fn with_idle_session<R>(
        &self,
        f: impl FnOnce(&mut ClusteringSession) -> R,
    ) -> Result<R, AnalysisError> {
        let mut state = self.lock()?;
        if state.running {
            return Err(AnalysisError::RunInProgress);
        }
        Ok(f(&mut state.session))
    }

    /// Merges `sources` into `target` and returns the refreshed result list.
    pub fn merge(
        &self,
        target: IdentityId,
        sources: &[IdentityId],
        aggregator: &Aggregator,
    ) -> Result<Vec<IdentitySummary>, AnalysisError> {
        self.with_idle_session(|session| -> Result<_, AnalysisError> {
            session.merge(target, sources)?;
            Ok(aggregator.summarize_all(session.identities(), session.frame_size()))
        })?
    }

    pub fn relabel(&self, id: IdentityId, label: &str) -> Result<(), AnalysisError> {
        self.with_idle_session(|session| session.relabel(id, label))?
            .map_err(AnalysisError::from)
    }

    /// Swaps in a different registry, e.g. one restored from disk.
    pub fn replace(&self, session: ClusteringSession) -> Result<(), AnalysisError> {
        self.with_idle_session(|current| *current = session)
    }

    pub fn summaries(
        &self,
        aggregator: &Aggregator,
    ) -> Result<Vec<IdentitySummary>, AnalysisError> {
        self.with_session(|session| {
            aggregator.summarize_all(session.identities(), session.frame_size())
        })
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, AnalysisError> {
        self.with_session(|session| session.snapshot())
    }
}
