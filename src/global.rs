use parking_lot::{const_mutex, Mutex};
use tracing::debug;

use crate::container::Container;

static GLOBAL: Mutex<Option<Container>> = const_mutex(None);

/// Process-wide container, created with [`Container::new`] on the first call
#[must_use]
pub fn global() -> Container {
    GLOBAL.lock().get_or_insert_with(Container::new).clone()
}

/// Replaces the process-wide container with a new one.
/// Handles returned by [`global`] before the reset keep the old container alive.
pub fn reset_global() {
    let previous = GLOBAL.lock().replace(Container::new());
    drop(previous);
    debug!("Global container reset");
}

#[cfg(test)]
mod tests {
    use super::{global, reset_global};

    use alloc::sync::Arc;

    #[test]
    fn test_global() {
        let container = global();
        assert!(Arc::ptr_eq(&container.inner, &global().inner));

        reset_global();
        assert!(!Arc::ptr_eq(&container.inner, &global().inner));
    }
}
