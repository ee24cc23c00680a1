pub mod effect;
pub mod json;
