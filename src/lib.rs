pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod paths;
pub mod quiz;

#[cfg(test)]
pub mod testing;

pub use engine::{QuizEngine, QuizError};
