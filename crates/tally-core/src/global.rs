//! Optional process-wide registry
//!
//! Libraries should take a registry handle explicitly. This is only for call
//! sites that cannot, and it must be installed and torn down by the
//! application.

use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::registry::MeterRegistry;

lazy_static! {
    static ref GLOBAL: RwLock<Option<Arc<MeterRegistry>>> = RwLock::new(None);
}

/// Install the global registry, returning the one it replaces
pub fn install(registry: Arc<MeterRegistry>) -> Option<Arc<MeterRegistry>> {
    GLOBAL.write().replace(registry)
}

/// The installed registry, if any
pub fn registry() -> Option<Arc<MeterRegistry>> {
    GLOBAL.read().clone()
}

/// Uninstall and return the global registry
pub fn teardown() -> Option<Arc<MeterRegistry>> {
    GLOBAL.write().take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::Tags;

    #[test]
    fn test_install_and_teardown() {
        let registry = Arc::new(MeterRegistry::new());
        install(registry.clone());

        let global = super::registry().unwrap();
        global.counter("global.hits", Tags::empty()).unwrap();
        assert_eq!(registry.len(), 1);

        let removed = teardown().unwrap();
        assert!(Arc::ptr_eq(&removed, &registry));
        assert!(super::registry().is_none());
    }
}
