//! 判分服务 - 业务能力层
//!
//! `Grader` 是判分后端的接口，`MockGrader` 是没有真实后端时的替身。
//! 替换为真实后端只需要实现同一个接口，流程层不受影响。

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::GradingError;
use crate::models::{AnswerChoice, CapturedImage, GradingResult, QuestionResult, TestDescriptor};

/// 判分后端
#[async_trait]
pub trait Grader: Send + Sync {
    /// 根据试卷描述和答题卡图片给出判分结果
    async fn grade(
        &self,
        descriptor: &TestDescriptor,
        images: &[CapturedImage],
    ) -> Result<GradingResult, GradingError>;
}

/// 模拟判分
///
/// 职责：
/// - 固定等待一段时间，模拟网络和识别耗时
/// - 每题独立抽样：按概率判为正确，否则给出一个不同的选项
/// - 不做任何图片分析
pub struct MockGrader {
    latency: Duration,
    correct_probability: f64,
    rng: Mutex<StdRng>,
}

impl MockGrader {
    pub fn new(latency: Duration, correct_probability: f64) -> Self {
        Self {
            latency,
            correct_probability: correct_probability.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// 固定随机种子，结果可复现
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let grader = Self::new(config.grading_latency(), config.correct_probability);
        match config.rng_seed {
            Some(seed) => grader.with_seed(seed),
            None => grader,
        }
    }

    fn sample(&self, question_count: u32) -> Vec<QuestionResult> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        (1..=question_count)
            .map(|question_number| {
                let correct_answer = AnswerChoice::ALL[rng.gen_range(0..AnswerChoice::ALL.len())];
                let is_correct = rng.gen_bool(self.correct_probability);
                let your_answer = if is_correct {
                    correct_answer
                } else {
                    let others: Vec<AnswerChoice> = AnswerChoice::ALL
                        .into_iter()
                        .filter(|c| *c != correct_answer)
                        .collect();
                    *others.choose(&mut *rng).unwrap_or(&correct_answer)
                };

                QuestionResult {
                    question_number,
                    your_answer,
                    correct_answer,
                    is_correct: your_answer == correct_answer,
                }
            })
            .collect()
    }
}

#[async_trait]
impl Grader for MockGrader {
    async fn grade(
        &self,
        descriptor: &TestDescriptor,
        images: &[CapturedImage],
    ) -> Result<GradingResult, GradingError> {
        if images.is_empty() {
            return Err(GradingError::NoImages);
        }
        let question_count = descriptor.question_count();
        if question_count == 0 {
            return Err(GradingError::InvalidQuestionCount(question_count));
        }

        debug!(
            "[测试 {}] 模拟判分: {} 页图片, 等待 {:?}",
            descriptor.test_id(),
            images.len(),
            self.latency
        );
        tokio::time::sleep(self.latency).await;

        let result = GradingResult::new(question_count, self.sample(question_count))?;
        info!(
            "[测试 {}] ✓ 模拟判分完成: {}/{}",
            descriptor.test_id(),
            result.correct_count(),
            question_count
        );
        Ok(result)
    }
}
