// src/config.rs
/// What the drain loop does with a task whose action failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Hand the failure to the owner's failure handler (or log it) and keep draining.
    #[default]
    Report,
    /// Stop the drain loop and return the failure as an error.
    Propagate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Worker threads are named `{prefix}-task-N`.
    pub thread_name_prefix: String,
    /// Stack size for worker threads; `None` uses the std default.
    pub stack_size: Option<usize>,
    pub failure_policy: FailurePolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "dispatch".to_string(),
            stack_size: None,
            failure_policy: FailurePolicy::Report,
        }
    }
}

impl DispatcherConfig {
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}
