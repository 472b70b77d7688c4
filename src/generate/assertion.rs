//! 用户断言：按注册顺序对 retval 求值
//!
//! 谓词返回 false 且带 message，或谓词本身返回 Err，都归一为同一形态的 AssertionFailure。

use std::fmt;
use std::sync::Arc;

use crate::core::{AssertionFailure, GenError};
use crate::signature::Retval;

type Predicate = Arc<dyn Fn(&Retval) -> Result<bool, String> + Send + Sync>;

/// 断言：谓词 + 错误信息 + 是否可选
#[derive(Clone)]
pub struct Assertion {
    predicate: Predicate,
    pub message: Option<String>,
    pub optional: bool,
}

impl Assertion {
    pub fn new(
        predicate: impl Fn(&Retval) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self {
            predicate: Arc::new(move |values| Ok(predicate(values))),
            message: Some(message.into()),
            optional: false,
        }
    }

    /// 谓词自身可能失败；Err 中的文本作为失败信息
    pub fn fallible(predicate: impl Fn(&Retval) -> Result<bool, String> + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
            message: None,
            optional: false,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 重试耗尽仍失败时降级为成功
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn failure(&self, message: String, values: &Retval) -> GenError {
        GenError::Assertion(AssertionFailure {
            message,
            values: values.clone(),
            optional: self.optional,
        })
    }
}

impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assertion")
            .field("message", &self.message)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

/// 依次检查断言，第一个失败即返回
pub fn check_assertions(assertions: &[Assertion], values: &Retval) -> Result<(), GenError> {
    for assertion in assertions {
        match (assertion.predicate)(values) {
            Ok(true) => {}
            Ok(false) => match &assertion.message {
                Some(message) => return Err(assertion.failure(message.clone(), values)),
                None => tracing::warn!("assertion without message returned false; ignored"),
            },
            Err(message) => return Err(assertion.failure(message, values)),
        }
    }
    Ok(())
}
