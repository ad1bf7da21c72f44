//! Session registry.
//!
//! Two tables keyed by [`SessionId`]: one holding submission rings and one
//! holding completion rings. Attach and detach update both under a single
//! write lock, so a reader never sees a session half-inserted.
//!
//! The worker takes a snapshot of the submission table once per pass and
//! looks up the matching completion ring per session. Values are `Arc`s: a
//! pass keeps every ring it observed alive until it drops the snapshot, even
//! if the session is detached in the meantime. Detach also sets the
//! submission side's closed flag so the rest of the pass stops touching it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use accel_core::error::AttachError;
use accel_core::layout::{COMPLETION_RING_SIZE, SUBMISSION_RING_SIZE};
use accel_core::session::SessionId;

use crate::completion_ring::CompletionSide;
use crate::region::SharedRegion;
use crate::submit_ring::SubmissionSide;

/// Both rings of one attached session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub submission: Arc<SubmissionSide>,
    pub completion: Arc<CompletionSide>,
}

#[derive(Default)]
struct Tables {
    submissions: HashMap<SessionId, Arc<SubmissionSide>>,
    completions: HashMap<SessionId, Arc<CompletionSide>>,
}

/// Concurrent map of attached sessions.
#[derive(Default)]
pub struct SessionRegistry {
    tables: RwLock<Tables>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate and register both rings for `id`.
    ///
    /// Regions are allocated before the write lock is taken. On any failure
    /// nothing is registered and whatever was allocated is released.
    pub fn attach(&self, id: SessionId) -> Result<Session, AttachError> {
        if self.tables.read().submissions.contains_key(&id) {
            return Err(AttachError::AlreadyAttached(id));
        }

        let submission = SharedRegion::create("submission", SUBMISSION_RING_SIZE)?;
        let completion = SharedRegion::create("completion", COMPLETION_RING_SIZE)?;

        let session = Session {
            id,
            submission: Arc::new(SubmissionSide::new(id, submission)),
            completion: Arc::new(CompletionSide::new(id, completion)),
        };

        let mut tables = self.tables.write();
        if tables.submissions.contains_key(&id) || tables.completions.contains_key(&id) {
            return Err(AttachError::AlreadyAttached(id));
        }
        tables
            .submissions
            .insert(id, Arc::clone(&session.submission));
        tables
            .completions
            .insert(id, Arc::clone(&session.completion));
        drop(tables);

        debug!(session = %id, "session attached");
        Ok(session)
    }

    /// Remove `id` from both tables. Returns whether it was attached.
    pub fn detach(&self, id: SessionId) -> bool {
        let (submission, completion) = {
            let mut tables = self.tables.write();
            (
                tables.submissions.remove(&id),
                tables.completions.remove(&id),
            )
        };
        if let Some(submission) = &submission {
            submission.close();
        }
        let found = submission.is_some() || completion.is_some();
        if found {
            debug!(session = %id, "session detached");
        }
        found
    }

    /// Both rings of `id`, if attached.
    pub fn lookup(&self, id: SessionId) -> Option<Session> {
        let tables = self.tables.read();
        let submission = tables.submissions.get(&id)?;
        let completion = tables.completions.get(&id)?;
        Some(Session {
            id,
            submission: Arc::clone(submission),
            completion: Arc::clone(completion),
        })
    }

    /// Snapshot of every submission ring, ordered by session id.
    pub fn submissions(&self) -> Vec<Arc<SubmissionSide>> {
        let tables = self.tables.read();
        let mut snapshot: Vec<_> = tables.submissions.values().cloned().collect();
        snapshot.sort_by_key(|s| s.id());
        snapshot
    }

    /// Completion ring registered for `id`.
    pub fn completion_for(&self, id: SessionId) -> Option<Arc<CompletionSide>> {
        self.tables.read().completions.get(&id).cloned()
    }

    /// Call `f` for every fully attached session, on a snapshot.
    pub fn for_each<F: FnMut(&Session)>(&self, mut f: F) {
        let snapshot: Vec<Session> = {
            let tables = self.tables.read();
            tables
                .submissions
                .iter()
                .filter_map(|(id, submission)| {
                    let completion = tables.completions.get(id)?;
                    Some(Session {
                        id: *id,
                        submission: Arc::clone(submission),
                        completion: Arc::clone(completion),
                    })
                })
                .collect()
        };
        for session in &snapshot {
            f(session);
        }
    }

    pub fn len(&self) -> usize {
        self.tables.read().submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_attach_lookup_detach() {
        let reg = SessionRegistry::new();
        let id = SessionId::new(10);

        let session = reg.attach(id).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(reg.len(), 1);
        assert!(reg.lookup(id).is_some());
        assert!(reg.completion_for(id).is_some());

        assert!(reg.detach(id));
        assert!(reg.is_empty());
        assert!(reg.lookup(id).is_none());
        assert!(reg.completion_for(id).is_none());
        assert!(session.submission.is_closed());
    }

    #[test]
    fn test_detach_absent_is_noop() {
        let reg = SessionRegistry::new();
        assert!(!reg.detach(SessionId::new(1)));
    }

    #[test]
    fn test_double_attach_rejected() {
        let reg = SessionRegistry::new();
        let id = SessionId::new(3);
        reg.attach(id).unwrap();
        assert_eq!(reg.attach(id).unwrap_err(), AttachError::AlreadyAttached(id));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_snapshot_outlives_detach() {
        let reg = SessionRegistry::new();
        let id = SessionId::new(4);
        reg.attach(id).unwrap();

        let snapshot = reg.submissions();
        reg.detach(id);

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].is_closed());
        // Region still mapped and readable.
        assert_eq!(snapshot[0].submitted(), 0);
        assert!(reg.completion_for(id).is_none());
    }

    #[test]
    fn test_for_each_and_ordering() {
        let reg = SessionRegistry::new();
        for raw in [9, 2, 5] {
            reg.attach(SessionId::new(raw)).unwrap();
        }
        let ids: Vec<_> = reg.submissions().iter().map(|s| s.id().as_u32()).collect();
        assert_eq!(ids, vec![2, 5, 9]);

        let mut seen = 0;
        reg.for_each(|s| {
            assert_eq!(s.submission.id(), s.completion.id());
            seen += 1;
        });
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_concurrent_attach_detach_during_scan() {
        let reg = Arc::new(SessionRegistry::new());

        let churn: Vec<_> = (0..4u32)
            .map(|t| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    for i in 0..50u32 {
                        let id = SessionId::new(t * 1000 + i);
                        reg.attach(id).unwrap();
                        reg.detach(id);
                    }
                })
            })
            .collect();

        let scanner = {
            let reg = Arc::clone(&reg);
            thread::spawn(move || {
                for _ in 0..200 {
                    for sub in reg.submissions() {
                        let _ = sub.submitted();
                        let _ = reg.completion_for(sub.id());
                    }
                }
            })
        };

        for h in churn {
            h.join().unwrap();
        }
        scanner.join().unwrap();
        assert!(reg.is_empty());
    }
}
