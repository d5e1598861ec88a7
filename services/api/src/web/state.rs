//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use training_tracker_core::{
    AuditLog, ClassifierService, CompletionTracker, DocumentRegistry, ExpirationScheduler,
};

/// The shared application state, created once at startup and passed to all handlers.
///
/// The four stores are explicit handles rather than process-wide singletons,
/// so tests can instantiate isolated instances.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<DocumentRegistry>,
    pub audit: Arc<AuditLog>,
    pub completions: Arc<CompletionTracker>,
    pub scheduler: Arc<ExpirationScheduler>,
    pub classifier: Arc<dyn ClassifierService>,
}
