//! 二维码内容解析 - 业务能力层
//!
//! 只负责"把扫到的文本变成试卷描述"，纯函数，不关心流程

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::ParseError;
use crate::models::TestDescriptor;

/// 二维码记录的字段结构
///
/// 字段先以 JSON 值接收，再逐个校验类型，避免一个字段类型不对就把整条记录判为无法解码
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTestPayload {
    test_id: Option<JsonValue>,
    answer_key_id: Option<JsonValue>,
    question_count: Option<JsonValue>,
    topic: Option<JsonValue>,
    difficulty: Option<JsonValue>,
}

/// 解析二维码文本
///
/// # 参数
/// - `raw_text`: 扫码库识别出的原始文本
///
/// # 返回
/// - 不是 JSON 对象：`ParseError::MalformedPayload`
/// - 缺少 `test_id` / `answer_key_id` / `question_count`，或题数不是正整数：
///   `ParseError::MissingRequiredFields`
pub fn parse(raw_text: &str) -> Result<TestDescriptor, ParseError> {
    let record = match serde_json::from_str::<JsonValue>(raw_text.trim()) {
        Ok(value @ JsonValue::Object(_)) => value,
        _ => return Err(ParseError::MalformedPayload),
    };

    let raw: RawTestPayload =
        serde_json::from_value(record).map_err(|_| ParseError::MalformedPayload)?;

    let test_id = raw.test_id.as_ref().and_then(text_field);
    let answer_key_id = raw.answer_key_id.as_ref().and_then(text_field);
    let question_count = raw.question_count.as_ref().and_then(count_field);

    let mut missing = Vec::new();
    if test_id.is_none() {
        missing.push("test_id");
    }
    if answer_key_id.is_none() {
        missing.push("answer_key_id");
    }
    if question_count.is_none() {
        missing.push("question_count");
    }

    match (test_id, answer_key_id, question_count) {
        (Some(test_id), Some(answer_key_id), Some(question_count)) => Ok(TestDescriptor::new(
            test_id,
            answer_key_id,
            question_count,
            raw.topic.as_ref().and_then(text_field),
            raw.difficulty.as_ref().and_then(text_field),
        )),
        _ => Err(ParseError::MissingRequiredFields { fields: missing }),
    }
}

/// 非空字符串；数字形式的编号也接受
fn text_field(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 正整数；允许写成字符串
fn count_field(value: &JsonValue) -> Option<u32> {
    let count = match value {
        JsonValue::Number(n) => n.as_u64()?,
        JsonValue::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(count).ok().filter(|c| *c > 0)
}
