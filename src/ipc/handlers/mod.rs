pub mod catalog;
pub mod core;
pub mod employees;
pub mod promotion;
pub mod reports;
pub mod setup;
pub mod status;
pub mod students;
