pub mod ancestry;
pub mod navigation;
