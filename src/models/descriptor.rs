//! 试卷描述
//!
//! 由二维码内容解析得到，只能通过 `services::qr_parser::parse` 构造

use serde::Serialize;
use std::fmt::Display;

/// 试卷描述
///
/// 构造后不可变：`test_id`、`answer_key_id` 非空，`question_count > 0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestDescriptor {
    test_id: String,
    answer_key_id: String,
    question_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    difficulty: Option<String>,
}

impl TestDescriptor {
    /// 仅供解析器在校验通过后调用
    pub(crate) fn new(
        test_id: String,
        answer_key_id: String,
        question_count: u32,
        topic: Option<String>,
        difficulty: Option<String>,
    ) -> Self {
        debug_assert!(!test_id.is_empty() && !answer_key_id.is_empty() && question_count > 0);
        Self {
            test_id,
            answer_key_id,
            question_count,
            topic,
            difficulty,
        }
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn answer_key_id(&self) -> &str {
        &self.answer_key_id
    }

    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }
}

impl Display for TestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[试卷 ID#{} 答案#{} 题数#{}]",
            self.test_id, self.answer_key_id, self.question_count
        )
    }
}
