pub mod change;
pub mod file;
