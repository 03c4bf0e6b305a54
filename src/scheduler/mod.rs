//! Mutual exclusion for deployment operations.
//!
//! Operations declare a [`SchedulingRule`] before touching the platform. The
//! scheduler grants rules immediately when nothing conflicting is active and
//! otherwise queues them in strict FIFO order: a request also waits behind
//! earlier queued requests it conflicts with, so waiting operations cannot be
//! starved by later arrivals.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

/// The kind of application-scoped operation a rule protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Push,
    Start,
    Stop,
    Restart,
    Delete,
    Refresh,
}

/// What an operation needs exclusive access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingRule {
    /// A whole-target refresh. Excludes every other operation on the target.
    Refresh { target: String },
    /// An operation on one application within a target.
    App {
        target: String,
        app: String,
        kind: OpKind,
    },
}

impl SchedulingRule {
    pub fn refresh(target: impl Into<String>) -> Self {
        SchedulingRule::Refresh {
            target: target.into(),
        }
    }

    pub fn app(target: impl Into<String>, app: impl Into<String>, kind: OpKind) -> Self {
        SchedulingRule::App {
            target: target.into(),
            app: app.into(),
            kind,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            SchedulingRule::Refresh { target } => target,
            SchedulingRule::App { target, .. } => target,
        }
    }

    /// Two rules conflict when they may not run concurrently.
    ///
    /// Rules on different targets never conflict. A refresh conflicts with
    /// everything on its target. Two application rules conflict when they
    /// name the same application, except that deletes are allowed to overlap
    /// anything; a delete's outcome does not depend on the other operation.
    pub fn conflicts_with(&self, other: &SchedulingRule) -> bool {
        if self.target() != other.target() {
            return false;
        }
        match (self, other) {
            (SchedulingRule::Refresh { .. }, _) | (_, SchedulingRule::Refresh { .. }) => true,
            (
                SchedulingRule::App { app: a, kind: ka, .. },
                SchedulingRule::App { app: b, kind: kb, .. },
            ) => a == b && *ka != OpKind::Delete && *kb != OpKind::Delete,
        }
    }
}

struct Waiter {
    id: u64,
    rule: SchedulingRule,
    tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    active: Vec<(u64, SchedulingRule)>,
    queue: VecDeque<Waiter>,
}

/// Grants and queues scheduling rules.
#[derive(Default)]
pub struct OperationScheduler {
    inner: Mutex<Inner>,
}

impl OperationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire the rule, waiting until every conflicting earlier operation
    /// has released. The returned permit releases on drop.
    pub async fn acquire(self: &Arc<Self>, rule: SchedulingRule) -> RulePermit {
        let (id, waiting) = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;

            let blocked = inner
                .active
                .iter()
                .any(|(_, active)| active.conflicts_with(&rule))
                || inner
                    .queue
                    .iter()
                    .any(|waiter| waiter.rule.conflicts_with(&rule));

            if blocked {
                let (tx, rx) = oneshot::channel();
                inner.queue.push_back(Waiter {
                    id,
                    rule: rule.clone(),
                    tx,
                });
                (id, Some(rx))
            } else {
                inner.active.push((id, rule.clone()));
                (id, None)
            }
        };

        // The permit exists for the whole wait: if this future is dropped
        // while queued, or after a grant it never got to observe, the
        // permit's Drop releases the entry and re-runs the grant scan.
        let permit = RulePermit {
            scheduler: Arc::clone(self),
            id,
        };

        if let Some(rx) = waiting {
            // A closed sender means the scheduler was dropped; proceed, the
            // permit's release will then be a no-op.
            let _ = rx.await;
        }

        permit
    }

    fn release(&self, id: u64) {
        let mut inner = self.lock();
        inner.active.retain(|(active_id, _)| *active_id != id);
        inner.queue.retain(|waiter| waiter.id != id);
        Self::grant_waiters(&mut inner);
    }

    /// Promote queued waiters that no longer conflict with anything active
    /// or anything still queued ahead of them.
    fn grant_waiters(inner: &mut Inner) {
        let mut i = 0;
        while i < inner.queue.len() {
            let rule = inner.queue[i].rule.clone();
            let blocked = inner
                .active
                .iter()
                .any(|(_, active)| active.conflicts_with(&rule))
                || inner
                    .queue
                    .iter()
                    .take(i)
                    .any(|earlier| earlier.rule.conflicts_with(&rule));
            if blocked {
                i += 1;
                continue;
            }

            if let Some(waiter) = inner.queue.remove(i) {
                // A dropped acquire future has already released its entry;
                // its closed sender must not be activated.
                if waiter.tx.send(()).is_ok() {
                    inner.active.push((waiter.id, rule));
                }
            }
            // the element now at i has not been examined yet
        }
    }

    #[cfg(test)]
    fn active_count(&self) -> usize {
        self.lock().active.len()
    }
}

/// An acquired scheduling rule. Dropping it releases the rule and wakes
/// eligible waiters.
pub struct RulePermit {
    scheduler: Arc<OperationScheduler>,
    id: u64,
}

impl Drop for RulePermit {
    fn drop(&mut self) {
        self.scheduler.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn push(app: &str) -> SchedulingRule {
        SchedulingRule::app("t1", app, OpKind::Push)
    }

    #[test]
    fn conflict_predicate() {
        let refresh = SchedulingRule::refresh("t1");
        let push_a = push("a");
        let push_b = push("b");
        let delete_a = SchedulingRule::app("t1", "a", OpKind::Delete);
        let other_target = SchedulingRule::app("t2", "a", OpKind::Push);

        assert!(refresh.conflicts_with(&push_a));
        assert!(push_a.conflicts_with(&refresh));
        assert!(refresh.conflicts_with(&SchedulingRule::refresh("t1")));

        assert!(push_a.conflicts_with(&push_a.clone()));
        assert!(!push_a.conflicts_with(&push_b));
        assert!(!push_a.conflicts_with(&delete_a));
        assert!(!delete_a.conflicts_with(&push_a));

        assert!(!push_a.conflicts_with(&other_target));
        assert!(!refresh.conflicts_with(&SchedulingRule::refresh("t2")));
    }

    #[tokio::test]
    async fn non_conflicting_rules_run_concurrently() {
        let scheduler = Arc::new(OperationScheduler::new());
        let _a = scheduler.acquire(push("a")).await;
        let _b = scheduler.acquire(push("b")).await;
        assert_eq!(scheduler.active_count(), 2);
    }

    #[tokio::test]
    async fn same_app_operations_serialize() {
        let scheduler = Arc::new(OperationScheduler::new());
        let first = scheduler.acquire(push("a")).await;

        let second = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move {
                let _permit = scheduler.acquire(push("a")).await;
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), second)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn refresh_excludes_everything_on_its_target() {
        let scheduler = Arc::new(OperationScheduler::new());
        let refresh = scheduler.acquire(SchedulingRule::refresh("t1")).await;

        let blocked = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move {
                let _permit = scheduler.acquire(push("a")).await;
            }
        });
        let elsewhere = scheduler
            .acquire(SchedulingRule::app("t2", "a", OpKind::Push))
            .await;
        drop(elsewhere);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        drop(refresh);
        tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn delete_overlaps_other_operations_on_same_app() {
        let scheduler = Arc::new(OperationScheduler::new());
        let _start = scheduler
            .acquire(SchedulingRule::app("t1", "a", OpKind::Start))
            .await;
        let _delete = scheduler
            .acquire(SchedulingRule::app("t1", "a", OpKind::Delete))
            .await;
        assert_eq!(scheduler.active_count(), 2);
    }

    #[tokio::test]
    async fn waiters_are_granted_in_fifo_order() {
        let scheduler = Arc::new(OperationScheduler::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = scheduler.acquire(push("a")).await;

        let mut handles = Vec::new();
        for tag in ["second", "third"] {
            let scheduler = Arc::clone(&scheduler);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let permit = scheduler.acquire(push("a")).await;
                order.lock().unwrap().push(tag);
                drop(permit);
            }));
            // let each waiter enqueue before the next
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        drop(first);
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec!["second", "third"]);
    }

    #[tokio::test]
    async fn late_arrival_waits_behind_conflicting_waiter() {
        // active: push(a); queued: refresh(t1); a later push(b) must not
        // jump ahead of the refresh even though it does not conflict with
        // the active rule.
        let scheduler = Arc::new(OperationScheduler::new());
        let first = scheduler.acquire(push("a")).await;

        let refresh = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move {
                let _permit = scheduler.acquire(SchedulingRule::refresh("t1")).await;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let push_b = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move {
                let _permit = scheduler.acquire(push("b")).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!push_b.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), refresh)
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), push_b)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn dropping_a_granted_but_unpolled_acquire_releases_the_rule() {
        let scheduler = Arc::new(OperationScheduler::new());
        let first = scheduler.acquire(push("a")).await;

        // poll once so the request enqueues behind `first`, then stop
        // polling it
        let mut second = Box::pin(scheduler.acquire(push("a")));
        assert!(tokio::time::timeout(Duration::from_millis(10), &mut second)
            .await
            .is_err());

        // releasing `first` grants `second` while it is not being polled;
        // dropping it now must hand the rule back
        drop(first);
        drop(second);

        let third = scheduler.acquire(push("a"));
        tokio::time::timeout(Duration::from_secs(1), third)
            .await
            .expect("rule was never released");
    }

    #[tokio::test]
    async fn dropping_a_waiting_acquire_does_not_wedge_the_queue() {
        let scheduler = Arc::new(OperationScheduler::new());
        let first = scheduler.acquire(push("a")).await;

        let abandoned = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move {
                let _permit = scheduler.acquire(push("a")).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        abandoned.abort();
        let _ = abandoned.await;

        let survivor = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move {
                let _permit = scheduler.acquire(push("a")).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), survivor)
            .await
            .unwrap()
            .unwrap();
    }
}
