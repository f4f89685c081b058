// src/condition.rs
use crate::registry::TaskRegistry;
use crate::task::OwnerId;

/// Decides when a drain loop may stop. Evaluated before every pop.
pub trait FinishCondition {
    fn all_finished(&mut self) -> bool;
}

impl<F> FinishCondition for F
where
    F: FnMut() -> bool,
{
    #[inline]
    fn all_finished(&mut self) -> bool {
        self()
    }
}

/// Holds once at most `limit` tasks of `owner` are still undelivered.
#[derive(Debug, Clone, Copy)]
pub struct OutstandingAtMost<'a> {
    registry: &'a TaskRegistry,
    owner: OwnerId,
    limit: usize,
}

/// The default condition: every registered task has been delivered.
pub type AllDelivered<'a> = OutstandingAtMost<'a>;

impl<'a> OutstandingAtMost<'a> {
    pub fn new(registry: &'a TaskRegistry, owner: OwnerId, limit: usize) -> Self {
        Self { registry, owner, limit }
    }

    pub fn all_delivered(registry: &'a TaskRegistry, owner: OwnerId) -> AllDelivered<'a> {
        Self::new(registry, owner, 0)
    }
}

impl FinishCondition for OutstandingAtMost<'_> {
    #[inline]
    fn all_finished(&mut self) -> bool {
        self.registry.size(self.owner) <= self.limit
    }
}
