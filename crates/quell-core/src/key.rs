//! Coalesce-key derivation strategies.
//!
//! A coalesce key names the group of tasks that supersede one another. How
//! it is derived has changed over the service's life (fixed strings, route
//! suffixes, provisioner/worker-type pairs), so derivation is a strategy
//! trait: a pure function of the attributes available at pending time. The
//! engine computes the key exactly once, on insert, and persists it with
//! the task; terminal events never re-derive.

use crate::event::TaskEvent;

/// Strategy for deriving a coalesce key from a pending task event.
///
/// Implementations must be pure: same event, same answer. `None` means the
/// event carries nothing this deployment coalesces on, and the engine
/// leaves the task untracked.
pub trait DeriveKey {
    /// Derive the coalesce key for `event`, if any.
    fn derive(&self, event: &TaskEvent) -> Option<String>;
}

/// Derive the key from the first CC routing label matching a known prefix.
///
/// A label `route.<prefix><rest>` yields `<rest>`. This mirrors how the
/// queue advertises coalesce-eligible tasks: submitters attach a route
/// under the deployment's namespace and the suffix names the group.
#[derive(Debug, Clone)]
pub struct RouteSuffix {
    prefix: String,
}

impl RouteSuffix {
    /// Create a strategy matching `route.<prefix>*` labels.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl DeriveKey for RouteSuffix {
    fn derive(&self, event: &TaskEvent) -> Option<String> {
        event.routes.iter().find_map(|route| {
            let route = route.strip_prefix("route.").unwrap_or(route);
            match route.strip_prefix(&self.prefix) {
                Some(rest) if !rest.is_empty() => Some(rest.to_string()),
                _ => None,
            }
        })
    }
}

/// Derive the key from the task's commonality fields:
/// `<provisionerId>.<workerType>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvisionerWorkerType;

impl DeriveKey for ProvisionerWorkerType {
    fn derive(&self, event: &TaskEvent) -> Option<String> {
        match (event.provisioner_id.as_deref(), event.worker_type.as_deref()) {
            (Some(provisioner), Some(worker)) if !provisioner.is_empty() && !worker.is_empty() => {
                Some(format!("{provisioner}.{worker}"))
            }
            _ => None,
        }
    }
}
