//! Shared test utilities for learnhub integration tests
//!
//! Provides a persistent Tokio runtime, a process-wide counter for unique
//! fixture names, and the database settings used by tests that need a real
//! Postgres instance.
//!
//! ## Usage
//!
//! In your test crate's `Cargo.toml`:
//! ```toml
//! [dev-dependencies]
//! learnhub-test-utils = { path = "../learnhub-test-utils" }
//! ```
//!
//! Database-backed tests are `#[ignore]`d and read `TEST_DATABASE_URL`:
//! ```no_run
//! #[test]
//! #[ignore = "requires TEST_DATABASE_URL"]
//! fn my_database_test() {
//!     let Some(config) = learnhub_test_utils::test_database_config() else {
//!         return;
//!     };
//!     learnhub_test_utils::get_test_runtime().block_on(async {
//!         let _ = config;
//!         // ... test logic ...
//!     });
//! }
//! ```

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use learnhub_config::DatabaseConfig;

/// Shared Tokio runtime for database-backed integration tests
///
/// Pools are bound to the runtime that created them, so tests that share a
/// pool must also share this runtime.
static TEST_RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();

/// Global counter for unique fixture names across test binaries
static FIXTURE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Get the shared test runtime (creates on first call, reuses thereafter)
///
/// Workers default to the CPU count; override with `TEST_RUNTIME_WORKERS`.
///
/// # Panics
/// Panics if the runtime cannot be created
#[allow(clippy::expect_used)] // Test infrastructure - panic on init failure is acceptable
pub fn get_test_runtime() -> &'static tokio::runtime::Runtime {
    TEST_RUNTIME.get_or_init(|| {
        let workers = std::env::var("TEST_RUNTIME_WORKERS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(std::num::NonZero::get)
                    .unwrap_or(4)
            });

        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("test-runtime")
            .worker_threads(workers)
            .build()
            .expect("Failed to create test runtime")
    })
}

/// Next value of a counter shared by every test in the process
///
/// ```
/// use learnhub_test_utils::next_fixture_id;
///
/// let slug = format!("test-course-{}", next_fixture_id());
/// assert!(slug.starts_with("test-course-"));
/// ```
pub fn next_fixture_id() -> usize {
    FIXTURE_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Database settings for tests, or `None` when `TEST_DATABASE_URL` is unset
///
/// `TEST_DIRECT_URL` populates the direct pool when present. A `.env` file is
/// loaded first.
pub fn test_database_config() -> Option<DatabaseConfig> {
    learnhub_common::initialize_environment();
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let direct = std::env::var("TEST_DIRECT_URL").ok();
    Some(DatabaseConfig::with_urls(Some(url), direct))
}
