pub mod render;
pub mod setup;
