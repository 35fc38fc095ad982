pub mod catalog;
pub mod core;
pub mod exports;
pub mod reports;
pub mod results;
