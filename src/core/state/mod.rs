mod store;

pub use store::{JsonFileStore, SettingsStore, STORE_FILE};
