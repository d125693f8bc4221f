use crate::task::Task;

/// What a mutation did, so a backend can pick its own write granularity.
/// Local blob storage ignores the detail and saves the whole collection;
/// document stores issue one call per affected document.
#[derive(Debug)]
pub enum Change<'a> {
    Created(&'a Task),
    Updated(&'a Task),
    Removed(u64),
    Cleared(&'a [u64]),
    /// Pure ordering change of the in-memory collection. Document stores
    /// carry no order and skip this.
    Reordered,
}

/// Callback for push-based backends; delivers full snapshots, never deltas.
pub type PushCallback = Box<dyn FnMut(Vec<Task>) + Send>;

/// Handle that tears down a push subscription when invoked.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// The store's only view of persistence. Implementations must tolerate
/// `persist` being called after every single mutation (write-through).
pub trait PersistenceGateway {
    fn load(&mut self) -> anyhow::Result<Vec<Task>>;

    fn persist(&mut self, tasks: &[Task], change: &Change<'_>) -> anyhow::Result<()>;

    /// Subscribe to remote-originated snapshots. Backends without a push
    /// channel return `None`.
    fn subscribe(&mut self, callback: PushCallback) -> Option<Unsubscribe> {
        let _ = callback;
        None
    }
}
