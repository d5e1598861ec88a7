pub mod ingest;
pub mod rest;
pub mod state;

pub use state::AppState;
