//! Navigation collaborator contract

/// The host's router
///
/// The engine only requests navigation. The host reports the resulting
/// route back through the engine handle's `route_changed`.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, path: &str);
}
