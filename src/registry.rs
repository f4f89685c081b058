// src/registry.rs
use crate::task::{OwnerId, TaskId, TaskRecord};

use dashmap::DashMap;

/// Outstanding tasks per owner.
///
/// A task enters at `run`/`handle_message` time and leaves only when the
/// drain loop consumes its message. Finishing execution does not remove
/// it, so "registry empty" really means "every callback has run".
#[derive(Debug, Default)]
pub struct TaskRegistry {
    outstanding: DashMap<OwnerId, Vec<TaskRecord>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self { outstanding: DashMap::new() }
    }

    pub fn register(&self, owner: OwnerId, record: TaskRecord) {
        self.outstanding.entry(owner).or_default().push(record);
    }

    /// Removes one entry for `task`. Returns `false` if it was not registered.
    pub fn unregister(&self, owner: OwnerId, task: TaskId) -> bool {
        let Some(mut list) = self.outstanding.get_mut(&owner) else {
            return false;
        };
        match list.iter().position(|r| r.id == task) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn size(&self, owner: OwnerId) -> usize {
        self.outstanding.get(&owner).map_or(0, |list| list.len())
    }

    /// Outstanding task ids in registration order.
    pub fn outstanding(&self, owner: OwnerId) -> Vec<TaskId> {
        self.outstanding
            .get(&owner)
            .map(|list| list.iter().map(|r| r.id).collect())
            .unwrap_or_default()
    }

    pub fn record(&self, owner: OwnerId, task: TaskId) -> Option<TaskRecord> {
        self.outstanding.get(&owner)?.iter().find(|r| r.id == task).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;
    use std::{sync::Arc, thread};

    fn rec(id: u64) -> TaskRecord {
        TaskRecord::new(TaskId(id), TaskKind::Spawned)
    }

    #[test]
    fn register_then_unregister() {
        let reg = TaskRegistry::new();
        let a = OwnerId(1);

        reg.register(a, rec(1));
        reg.register(a, rec(2));
        assert_eq!(reg.size(a), 2);
        assert_eq!(reg.outstanding(a), vec![TaskId(1), TaskId(2)]);

        assert!(reg.unregister(a, TaskId(1)));
        assert_eq!(reg.outstanding(a), vec![TaskId(2)]);
    }

    #[test]
    fn unregister_unknown_is_a_no_op() {
        let reg = TaskRegistry::new();
        let a = OwnerId(1);
        assert!(!reg.unregister(a, TaskId(5)));

        reg.register(a, rec(1));
        assert!(!reg.unregister(a, TaskId(5)));
        assert_eq!(reg.size(a), 1);
    }

    #[test]
    fn owners_are_isolated() {
        let reg = TaskRegistry::new();
        reg.register(OwnerId(1), rec(1));
        reg.register(OwnerId(2), rec(2));

        assert!(!reg.unregister(OwnerId(1), TaskId(2)));
        assert_eq!(reg.size(OwnerId(1)), 1);
        assert_eq!(reg.size(OwnerId(2)), 1);
        assert_eq!(reg.size(OwnerId(3)), 0);
    }

    #[test]
    fn record_keeps_kind() {
        let reg = TaskRegistry::new();
        reg.register(OwnerId(1), TaskRecord::new(TaskId(4), TaskKind::Injected));
        let r = reg.record(OwnerId(1), TaskId(4)).unwrap();
        assert_eq!(r.kind, TaskKind::Injected);
        assert!(reg.record(OwnerId(1), TaskId(5)).is_none());
    }

    #[test]
    fn concurrent_register_and_unregister() {
        let reg = Arc::new(TaskRegistry::new());
        let owner = OwnerId(1);

        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let reg = reg.clone();
                thread::spawn(move || {
                    for i in 0..100u64 {
                        let id = t * 1000 + i;
                        reg.register(owner, rec(id));
                        if i % 2 == 0 {
                            assert!(reg.unregister(owner, TaskId(id)));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(reg.size(owner), 8 * 50);
    }
}
