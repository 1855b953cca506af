pub mod handler;
pub mod recorder;
