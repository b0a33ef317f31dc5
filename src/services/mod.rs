//! Workload hosted by the binary.
//!
//! # Data Flow
//! ```text
//! ServicesConfig
//!     → http.rs        one orchestrated thread per server, sharing the store
//!     → components.rs  one termination hook per component
//!     → store.rs       released by the final `kv-store` hook
//! ```
//!
//! Hooks run after every server has drained, so the store outlives its
//! last request.

pub mod components;
pub mod http;
pub mod store;

use std::sync::Arc;

use crate::config::ServicesConfig;
use crate::lifecycle::{BoxError, LifecycleError, Orchestrator};

pub use components::{Component, ComponentError};
pub use http::HttpService;
pub use store::{KvStore, StoreError, STORE_HOOK_NAME};

/// Register every server thread, component hook and the store hook.
///
/// Component hooks run in configuration order, then the store is released.
pub fn register_services(
    orchestrator: &mut Orchestrator,
    config: &ServicesConfig,
) -> Result<Arc<KvStore>, LifecycleError> {
    let store = Arc::new(KvStore::new());

    for server in &config.servers {
        let service = HttpService::new(server, store.clone(), config.slow_request());
        orchestrator.register_thread(server.name.clone(), move |token, registrar| {
            service.run(token, registrar)
        })?;
    }

    for component in config.components.iter().map(Component::new) {
        orchestrator.register_hook(component.label().to_string(), move |_deadline| async move {
            component.dispose().await.map_err(BoxError::from)
        })?;
    }

    let released = store.clone();
    orchestrator.register_hook(STORE_HOOK_NAME, move |deadline| async move {
        released.release(deadline).await
    })?;

    Ok(store)
}
