pub mod release;
pub mod render;
