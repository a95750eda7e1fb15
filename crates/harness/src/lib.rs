mod cloud;
mod device;
mod faulty;

pub use cloud::TestCloud;
pub use device::TestDevice;
pub use faulty::FaultyStore;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
