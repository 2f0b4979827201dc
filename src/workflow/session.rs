//! 扫码判分会话
//!
//! 一次"扫码 → 拍答题卡 → 判分 → 看结果"过程中的全部数据，只在内存中保存

use std::fmt::Display;

use crate::models::{GradingResult, TestDescriptor};
use crate::services::ImageCaptureStore;

/// 流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// 等待扫描试卷二维码
    AwaitingQr,
    /// 拍摄/选择答题卡
    CapturingSheet,
    /// 判分中
    Grading,
    /// 展示成绩
    ShowingResults,
}

impl Phase {
    /// 在流程中的先后顺序
    pub fn order(self) -> usize {
        match self {
            Phase::AwaitingQr => 0,
            Phase::CapturingSheet => 1,
            Phase::Grading => 2,
            Phase::ShowingResults => 3,
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::AwaitingQr => "等待扫码",
            Phase::CapturingSheet => "拍摄答题卡",
            Phase::Grading => "判分中",
            Phase::ShowingResults => "查看成绩",
        };
        f.write_str(name)
    }
}

/// 进度条上的一步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Active,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressStep {
    pub label: &'static str,
    pub status: StepStatus,
}

/// 用户可见的三个步骤，判分阶段没有单独的一步
const VISIBLE_STEPS: [(&str, Phase); 3] = [
    ("Scan QR", Phase::AwaitingQr),
    ("Capture Sheet", Phase::CapturingSheet),
    ("View Results", Phase::ShowingResults),
];

/// 扫码判分会话
///
/// 会话独占试卷描述、图片和成绩；外部只能读取，修改都经由 `ScanFlow`
#[derive(Debug)]
pub struct WorkflowSession {
    phase: Phase,
    descriptor: Option<TestDescriptor>,
    images: ImageCaptureStore,
    result: Option<GradingResult>,
}

impl Default for WorkflowSession {
    fn default() -> Self {
        Self {
            phase: Phase::AwaitingQr,
            descriptor: None,
            images: ImageCaptureStore::new(),
            result: None,
        }
    }
}

impl WorkflowSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn descriptor(&self) -> Option<&TestDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn images(&self) -> &ImageCaptureStore {
        &self.images
    }

    pub fn result(&self) -> Option<&GradingResult> {
        self.result.as_ref()
    }

    /// 进度条状态
    pub fn progress(&self) -> [ProgressStep; 3] {
        let current = self.phase;
        VISIBLE_STEPS.map(|(label, step_phase)| {
            let status = if step_phase.order() < current.order() {
                StepStatus::Complete
            } else if step_phase == current
                || (step_phase == Phase::ShowingResults && current == Phase::Grading)
            {
                StepStatus::Active
            } else {
                StepStatus::Pending
            };
            ProgressStep { label, status }
        })
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn store_descriptor(&mut self, descriptor: TestDescriptor) -> &TestDescriptor {
        self.descriptor.insert(descriptor)
    }

    pub(crate) fn images_mut(&mut self) -> &mut ImageCaptureStore {
        &mut self.images
    }

    pub(crate) fn store_result(&mut self, result: GradingResult) -> &GradingResult {
        self.result.insert(result)
    }

    /// 丢弃所有数据（释放预览句柄）并回到等待扫码
    pub(crate) fn clear(&mut self) {
        self.descriptor = None;
        self.images.clear();
        self.result = None;
        self.phase = Phase::AwaitingQr;
    }
}
