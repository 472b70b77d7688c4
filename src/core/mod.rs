//! 核心层：错误与恢复（引导字段构建）、生成器构建

pub mod builder;
pub mod error;
pub mod recovery;

pub use builder::GeneratorBuilder;
pub use error::{AssertionFailure, Failure, GenError, RecoveryAction, ValidationFailure};
pub use recovery::{RecoveryEngine, INSTRUCTIONS_FIELD};
