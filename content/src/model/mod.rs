pub mod content;
pub mod stores;
