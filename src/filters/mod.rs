pub mod gravity;

pub use gravity::{Gate, GravityFilter, GravityState};
