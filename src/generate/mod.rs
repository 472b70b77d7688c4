//! 生成层：断言、补全拼接、输出解析、工具分发、主循环与过程事件

pub mod assembler;
pub mod assertion;
pub mod dispatcher;
pub mod driver;
pub mod events;
pub mod resolver;

pub use assembler::CompletionAssembler;
pub use assertion::{check_assertions, Assertion};
pub use dispatcher::ToolDispatcher;
pub use driver::{
    ForwardOptions, GenOutput, Generator, Trace, DEFAULT_MAX_COMPLETIONS, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_STEPS, DEFAULT_TERMINAL_FUNCTION,
};
pub use events::{EventSink, GenEvent};
pub use resolver::{FunctionCallStrategy, OutputResolver, Resolved};
