//! 判分结果及成绩摘要

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::GradingError;

/// 成绩页最多预览的错题数量
pub const REVIEW_PREVIEW_LIMIT: usize = 5;

/// 选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerChoice {
    A,
    B,
    C,
    D,
}

impl AnswerChoice {
    pub const ALL: [AnswerChoice; 4] = [
        AnswerChoice::A,
        AnswerChoice::B,
        AnswerChoice::C,
        AnswerChoice::D,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnswerChoice::A => "A",
            AnswerChoice::B => "B",
            AnswerChoice::C => "C",
            AnswerChoice::D => "D",
        }
    }
}

impl Display for AnswerChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单题判分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    /// 题号（从1开始）
    pub question_number: u32,
    pub your_answer: AnswerChoice,
    pub correct_answer: AnswerChoice,
    pub is_correct: bool,
}

/// 整张答题卡的判分结果
///
/// 只能通过 `GradingResult::new` 构造：题号 1..=N 连续递增，`correct_count` 等于判对的题数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    correct_count: u32,
    per_question: Vec<QuestionResult>,
}

impl GradingResult {
    /// 校验并构造判分结果
    ///
    /// # 参数
    /// - `question_count`: 试卷题目数量
    /// - `per_question`: 按题号排列的单题结果
    pub fn new(question_count: u32, per_question: Vec<QuestionResult>) -> Result<Self, GradingError> {
        if question_count == 0 {
            return Err(GradingError::InvalidQuestionCount(question_count));
        }
        if per_question.len() != question_count as usize {
            return Err(GradingError::InconsistentResult(format!(
                "应有 {} 题，实际 {} 题",
                question_count,
                per_question.len()
            )));
        }

        let mut correct_count = 0;
        for (index, entry) in per_question.iter().enumerate() {
            let expected = index as u32 + 1;
            if entry.question_number != expected {
                return Err(GradingError::InconsistentResult(format!(
                    "第 {} 项题号为 {}",
                    expected, entry.question_number
                )));
            }
            if entry.is_correct != (entry.your_answer == entry.correct_answer) {
                return Err(GradingError::InconsistentResult(format!(
                    "第 {} 题的对错标记与答案不符",
                    expected
                )));
            }
            if entry.is_correct {
                correct_count += 1;
            }
        }

        Ok(Self {
            correct_count,
            per_question,
        })
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn question_count(&self) -> u32 {
        self.per_question.len() as u32
    }

    pub fn per_question(&self) -> &[QuestionResult] {
        &self.per_question
    }

    pub fn incorrect(&self) -> impl Iterator<Item = &QuestionResult> {
        self.per_question.iter().filter(|r| !r.is_correct)
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary::from_result(self)
    }
}

/// 分数档位（对应成绩页的颜色）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    /// >= 80
    Success,
    /// >= 60
    Warning,
    Destructive,
}

/// 成绩页摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSummary {
    pub total: u32,
    pub correct: u32,
    pub incorrect: u32,
    /// 百分制分数（四舍五入）
    pub percentage: u32,
    pub tier: ScoreTier,
    /// 最多 `REVIEW_PREVIEW_LIMIT` 道错题
    pub review_preview: Vec<QuestionResult>,
    /// 预览之外还剩多少道错题
    pub remaining_review: u32,
}

impl ScoreSummary {
    pub fn from_result(result: &GradingResult) -> Self {
        let total = result.question_count();
        let correct = result.correct_count();
        let incorrect = total - correct;
        let percentage = (f64::from(correct) / f64::from(total) * 100.0).round() as u32;

        let tier = match percentage {
            80.. => ScoreTier::Success,
            60.. => ScoreTier::Warning,
            _ => ScoreTier::Destructive,
        };

        let review_preview: Vec<QuestionResult> = result
            .incorrect()
            .take(REVIEW_PREVIEW_LIMIT)
            .cloned()
            .collect();
        let remaining_review = incorrect.saturating_sub(review_preview.len() as u32);

        Self {
            total,
            correct,
            incorrect,
            percentage,
            tier,
            review_preview,
            remaining_review,
        }
    }

    /// 鼓励语
    pub fn message(&self) -> &'static str {
        match self.percentage {
            90.. => "Excellent work! 🌟",
            80.. => "Great job! Keep it up! 👏",
            70.. => "Good effort! Room to improve 💪",
            60.. => "Keep practicing! You've got this 📚",
            _ => "Don't give up! Let's review together 🤝",
        }
    }

    /// 学习建议
    pub fn insight(&self) -> String {
        if self.incorrect == 0 {
            return "Perfect score! You've mastered this topic. Consider moving to more challenging problems."
                .to_string();
        }
        let focus = if self.incorrect > 3 {
            "fundamental concepts"
        } else {
            "specific question types"
        };
        format!(
            "Based on your answers, you may want to review {} in this topic. View detailed explanations to understand your mistakes.",
            focus
        )
    }
}

impl Display for ScoreSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({}%)",
            self.correct, self.total, self.percentage
        )
    }
}
