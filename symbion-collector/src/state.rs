use parking_lot::Mutex;
use std::sync::Arc;

/// State owned by one task and read by others through short lock sections.
pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
