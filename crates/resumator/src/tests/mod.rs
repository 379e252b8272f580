mod fixtures;
mod serde_tests;
mod toggle_tests;
