//! Routing and rendering collaborator

use std::fmt::Debug;

/// Actions a guard asks of the surrounding application
///
/// Implementations must not call back into the same guard synchronously
/// while holding their own locks; guards invoke these with no lock held.
pub trait RecoveryHost: Send + Sync + Debug {
    /// Re-render the children of `guard_id`
    fn rerender(&self, guard_id: &str);

    /// Full navigation to `path`
    fn navigate(&self, path: &str);

    /// Full reload of the current page
    fn reload(&self);
}
