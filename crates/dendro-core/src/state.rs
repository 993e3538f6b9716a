//! Process-wide engine state.
//!
//! The volumetric engine is initialized once per process. Every grid
//! construction calls [`initialize`], which is a no-op after the first call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{OnceLock, RwLock};

use crate::settings::Settings;

/// Global engine state singleton.
static ENGINE: OnceLock<RwLock<EngineState>> = OnceLock::new();

/// Counts grids constructed since initialization.
static GRIDS_CREATED: AtomicU64 = AtomicU64::new(0);

/// State shared by every grid in the process.
#[derive(Debug, Default)]
pub struct EngineState {
    /// Settings used when a caller does not supply its own.
    pub default_settings: Settings,
}

/// Initializes the engine. Repeated calls are no-ops.
pub fn initialize() {
    ENGINE.get_or_init(|| {
        log::info!("initializing volumetric engine");
        RwLock::new(EngineState::default())
    });
}

/// Initializes `env_logger` and the engine.
///
/// Used by entry points that own the process, such as the C ABI. A logger
/// installed earlier by the host is left in place.
pub fn initialize_with_logging() {
    let _ = env_logger::try_init();
    initialize();
}

/// Returns whether [`initialize`] has run.
pub fn is_initialized() -> bool {
    ENGINE.get().is_some()
}

/// Records a grid construction, initializing the engine on first use.
pub fn register_grid() -> u64 {
    initialize();
    GRIDS_CREATED.fetch_add(1, Ordering::Relaxed) + 1
}

/// Number of grids constructed so far.
pub fn grids_created() -> u64 {
    GRIDS_CREATED.load(Ordering::Relaxed)
}

/// Reads the engine state, initializing it first if needed.
pub fn with_state<F, R>(f: F) -> R
where
    F: FnOnce(&EngineState) -> R,
{
    initialize();
    match ENGINE.get().map(RwLock::read) {
        Some(Ok(guard)) => f(&guard),
        Some(Err(poisoned)) => f(&poisoned.into_inner()),
        None => f(&EngineState::default()),
    }
}

/// Mutates the engine state, initializing it first if needed.
pub fn with_state_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut EngineState) -> R,
{
    initialize();
    match ENGINE.get().map(RwLock::write) {
        Some(Ok(mut guard)) => f(&mut guard),
        Some(Err(poisoned)) => f(&mut poisoned.into_inner()),
        None => f(&mut EngineState::default()),
    }
}

/// Default settings, validated.
pub fn default_settings() -> Settings {
    with_state(|state| state.default_settings.validated())
}
