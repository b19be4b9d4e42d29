/*!
Helpers communs aux tests
*/

/// Init logging pour tests, idempotent (`RUST_LOG` pour le niveau)
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
