pub mod item;
pub mod quiz;

pub use item::*;
pub use quiz::*;
