pub mod assembler;
pub mod grader;

pub use assembler::{assemble, collect_pool, AssemblyError, SizingPolicy};
pub use grader::grade;
