pub mod classifier;
pub mod store;

pub use classifier::OpenAiClassifierAdapter;
pub use store::JsonFileStore;
