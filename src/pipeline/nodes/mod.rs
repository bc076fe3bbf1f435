pub mod basic;
pub mod image;
pub mod markup;
pub mod script;
pub mod style;
