use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use answer_sheet_scan::error::{AppError, DeviceError, GradingError, ParseError, WorkflowError};
use answer_sheet_scan::models::{
    AnswerChoice, CameraFrame, CapturedImage, GradingResult, QuestionResult, SelectedFile,
    TestDescriptor,
};
use answer_sheet_scan::services::{Camera, CameraDevice, Grader, VideoStream};
use answer_sheet_scan::workflow::{Command, NavigationIntent, Notice, Phase, ScanFlow, WorkflowEvent};
use answer_sheet_scan::{Config, SessionDriver};
use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n0000";
const T1: &str = r#"{"test_id":"T1","answer_key_id":"K1","question_count":5}"#;

// ========== 测试替身 ==========

/// 判分结果固定：奇数题答对
struct FixedGrader;

#[async_trait]
impl Grader for FixedGrader {
    async fn grade(
        &self,
        descriptor: &TestDescriptor,
        images: &[CapturedImage],
    ) -> Result<GradingResult, GradingError> {
        if images.is_empty() {
            return Err(GradingError::NoImages);
        }
        let entries = (1..=descriptor.question_count())
            .map(|n| {
                let your_answer = if n % 2 == 1 {
                    AnswerChoice::A
                } else {
                    AnswerChoice::B
                };
                QuestionResult {
                    question_number: n,
                    your_answer,
                    correct_answer: AnswerChoice::A,
                    is_correct: your_answer == AnswerChoice::A,
                }
            })
            .collect();
        GradingResult::new(descriptor.question_count(), entries)
    }
}

/// 第一次调用失败，之后与 `FixedGrader` 相同
struct FlakyGrader {
    failed_once: AtomicBool,
}

#[async_trait]
impl Grader for FlakyGrader {
    async fn grade(
        &self,
        descriptor: &TestDescriptor,
        images: &[CapturedImage],
    ) -> Result<GradingResult, GradingError> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(GradingError::Backend("service unavailable".to_string()));
        }
        FixedGrader.grade(descriptor, images).await
    }
}

/// 返回题数不对的结果
struct WrongCountGrader;

#[async_trait]
impl Grader for WrongCountGrader {
    async fn grade(
        &self,
        _descriptor: &TestDescriptor,
        _images: &[CapturedImage],
    ) -> Result<GradingResult, GradingError> {
        let entries = vec![QuestionResult {
            question_number: 1,
            your_answer: AnswerChoice::C,
            correct_answer: AnswerChoice::C,
            is_correct: true,
        }];
        GradingResult::new(1, entries)
    }
}

/// 可脚本化的摄像头，记录打开的设备和仍在使用的视频流数量
struct FakeCamera {
    devices: Result<Vec<CameraDevice>, DeviceError>,
    payloads: Vec<String>,
    open_streams: Arc<AtomicUsize>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl FakeCamera {
    fn new(labels: &[&str], payloads: &[&str]) -> Self {
        let devices = labels
            .iter()
            .enumerate()
            .map(|(i, label)| CameraDevice::new(format!("cam-{}", i + 1), *label))
            .collect();
        Self {
            devices: Ok(devices),
            payloads: payloads.iter().map(|p| p.to_string()).collect(),
            open_streams: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing(error: DeviceError) -> Self {
        Self {
            devices: Err(error),
            ..Self::new(&[], &[])
        }
    }

    fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

struct FakeStream {
    payloads: VecDeque<String>,
    open_streams: Arc<AtomicUsize>,
    stopped: bool,
}

impl VideoStream for FakeStream {
    fn try_decode(&mut self) -> Result<Option<String>, DeviceError> {
        Ok(self.payloads.pop_front())
    }

    fn capture_frame(&mut self) -> Result<CameraFrame, DeviceError> {
        Ok(CameraFrame::new(PNG.to_vec()))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn devices(&self) -> Result<Vec<CameraDevice>, DeviceError> {
        self.devices.clone()
    }

    async fn open(&self, device_id: &str) -> Result<Box<dyn VideoStream>, DeviceError> {
        self.opened.lock().unwrap().push(device_id.to_string());
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            payloads: self.payloads.iter().cloned().collect(),
            open_streams: Arc::clone(&self.open_streams),
            stopped: false,
        }))
    }
}

// ========== 辅助函数 ==========

fn flow_with(grader: impl Grader + 'static) -> ScanFlow {
    let config = Config {
        scanner_fps: 100,
        ..Config::default()
    };
    ScanFlow::from_config(&config, Arc::new(grader))
}

fn png_file(name: &str) -> SelectedFile {
    SelectedFile::new(name, Some("image/png".to_string()), PNG.to_vec())
}

fn notices(events: &[WorkflowEvent]) -> Vec<&Notice> {
    events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::Notice(n) => Some(n),
            _ => None,
        })
        .collect()
}

// ========== 完整流程 ==========

#[tokio::test]
async fn test_happy_path_reaches_results() {
    let mut flow = flow_with(FixedGrader);

    let descriptor = assert_ok!(flow.submit_qr(T1).await);
    assert_eq!(descriptor.question_count(), 5);
    assert_eq!(flow.phase(), Phase::CapturingSheet);

    assert_eq!(assert_ok!(flow.add_from_files(vec![png_file("p1.png")])), 1);

    let result = assert_ok!(flow.submit_images().await);
    assert_eq!(result.question_count(), 5);
    assert_eq!(result.correct_count(), 3);
    assert_eq!(flow.phase(), Phase::ShowingResults);

    let summary = flow.session().result().unwrap().summary();
    assert_eq!(summary.percentage, 60);
    assert_eq!(summary.review_preview.len(), 2);

    let events = flow.drain_events();
    let phases: Vec<Phase> = events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::PhaseChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![Phase::CapturingSheet, Phase::Grading, Phase::ShowingResults]
    );
    assert!(notices(&events).contains(&&Notice::GradingComplete {
        correct: 3,
        total: 5
    }));
}

#[tokio::test]
async fn test_invalid_payloads_stay_awaiting_qr() {
    let mut flow = flow_with(FixedGrader);

    let err = assert_err!(flow.submit_qr("not-json").await);
    assert!(matches!(err, AppError::Parse(ParseError::MalformedPayload)));
    assert_eq!(flow.phase(), Phase::AwaitingQr);

    let err = assert_err!(flow.submit_qr(r#"{"test_id":"T1"}"#).await);
    match err {
        AppError::Parse(ParseError::MissingRequiredFields { fields }) => {
            assert_eq!(fields, vec!["answer_key_id", "question_count"]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(flow.phase(), Phase::AwaitingQr);
    assert!(flow.session().descriptor().is_none());

    let events = flow.drain_events();
    assert_eq!(notices(&events).len(), 2);
    assert!(events
        .iter()
        .all(|e| !matches!(e, WorkflowEvent::PhaseChanged { .. })));
}

#[tokio::test]
async fn test_submit_without_images_stays_capturing() {
    let mut flow = flow_with(FixedGrader);
    assert_ok!(flow.submit_qr(T1).await);
    flow.drain_events();

    let err = assert_err!(flow.submit_images().await);
    assert!(matches!(err, AppError::Grading(GradingError::NoImages)));
    assert_eq!(flow.phase(), Phase::CapturingSheet);
    assert!(flow.session().result().is_none());

    let events = flow.drain_events();
    assert!(matches!(
        notices(&events).as_slice(),
        [Notice::GradingFailed { .. }]
    ));
}

#[tokio::test]
async fn test_grading_failure_keeps_images_and_allows_retry() {
    let mut flow = flow_with(FlakyGrader {
        failed_once: AtomicBool::new(false),
    });
    assert_ok!(flow.submit_qr(T1).await);
    assert_ok!(flow.add_from_files(vec![png_file("p1.png"), png_file("p2.png")]));

    let err = assert_err!(flow.submit_images().await);
    assert!(matches!(err, AppError::Grading(GradingError::Backend(_))));
    assert_eq!(flow.phase(), Phase::CapturingSheet);
    assert_eq!(flow.session().images().len(), 2);
    assert!(flow.session().result().is_none());

    assert_ok!(flow.submit_images().await);
    assert_eq!(flow.phase(), Phase::ShowingResults);
}

#[tokio::test]
async fn test_result_with_wrong_question_count_is_a_failure() {
    let mut flow = flow_with(WrongCountGrader);
    assert_ok!(flow.submit_qr(T1).await);
    assert_ok!(flow.add_from_files(vec![png_file("p1.png")]));

    let err = assert_err!(flow.submit_images().await);
    assert!(matches!(
        err,
        AppError::Grading(GradingError::InconsistentResult(_))
    ));
    assert_eq!(flow.phase(), Phase::CapturingSheet);
    assert!(flow.session().result().is_none());
}

#[tokio::test]
async fn test_reset_releases_everything() {
    let mut flow = flow_with(FixedGrader);
    assert_ok!(flow.submit_qr(T1).await);
    assert_ok!(flow.add_from_files(vec![
        png_file("p1.png"),
        png_file("p2.png"),
        SelectedFile::new("notes.txt", Some("text/plain".to_string()), b"hello".to_vec()),
    ]));
    assert_eq!(flow.session().images().len(), 2);
    assert_ok!(flow.remove_image(0));
    assert_ok!(flow.submit_images().await);

    flow.reset().await;
    let session = flow.session();
    assert_eq!(session.phase(), Phase::AwaitingQr);
    assert!(session.descriptor().is_none());
    assert!(session.images().is_empty());
    assert!(session.result().is_none());
    assert_eq!(session.images().previews().live_count(), 0);
    assert_eq!(session.images().previews().released_count(), 2);

    // 重置后可以开始新的会话
    assert_ok!(flow.submit_qr(T1).await);
}

#[tokio::test]
async fn test_mutations_rejected_in_wrong_phase() {
    let mut flow = flow_with(FixedGrader);

    let err = assert_err!(flow.add_from_files(vec![png_file("p1.png")]));
    assert!(matches!(
        err,
        AppError::Workflow(WorkflowError::InvalidTransition {
            phase: Phase::AwaitingQr,
            ..
        })
    ));
    assert_err!(flow.remove_image(0));
    assert_err!(flow.show_details());

    assert_ok!(flow.submit_qr(T1).await);
    assert_err!(flow.submit_qr(T1).await);
    let err = assert_err!(flow.remove_image(3));
    assert!(matches!(err, AppError::Capture(_)));

    assert_ok!(flow.add_from_files(vec![png_file("p1.png")]));
    assert_ok!(flow.submit_images().await);
    assert_err!(flow.add_from_files(vec![png_file("p2.png")]));
    assert_eq!(flow.session().images().len(), 1);
}

#[tokio::test]
async fn test_results_navigation() {
    let mut flow = flow_with(FixedGrader);
    assert_ok!(flow.submit_qr(T1).await);
    assert_ok!(flow.add_from_files(vec![png_file("p1.png")]));
    assert_ok!(flow.submit_images().await);

    let intent = assert_ok!(flow.show_details());
    assert_eq!(
        intent,
        NavigationIntent::ShowDetails {
            test_id: "T1".to_string()
        }
    );

    assert_eq!(flow.scan_another().await, NavigationIntent::ScanAnother);
    assert_eq!(flow.phase(), Phase::AwaitingQr);
}

// ========== 摄像头 ==========

#[tokio::test]
async fn test_scanner_skips_invalid_codes_and_releases_camera() {
    let camera = FakeCamera::new(&["Front", "Back Camera"], &["hello", T1]);
    let mut flow = flow_with(FixedGrader);

    assert_ok!(flow.start_scanner(&camera).await);
    assert!(flow.is_scanning());
    assert_eq!(flow.scanning_device(), Some("cam-2"));
    assert_eq!(camera.open_streams(), 1);

    let descriptor = assert_ok!(flow.scan_qr().await);
    assert_eq!(descriptor.test_id(), "T1");
    assert_eq!(flow.phase(), Phase::CapturingSheet);
    assert!(!flow.is_scanning());
    assert_eq!(camera.open_streams(), 0);

    let events = flow.drain_events();
    let seen = notices(&events);
    assert!(matches!(seen[0], Notice::InvalidQr(ParseError::MalformedPayload)));
    assert!(matches!(seen[1], Notice::QrScanned { .. }));
}

#[tokio::test]
async fn test_manual_submit_while_scanning_releases_camera() {
    let camera = FakeCamera::new(&["Back Camera"], &[]);
    let mut flow = flow_with(FixedGrader);

    assert_ok!(flow.start_scanner(&camera).await);
    assert_eq!(camera.open_streams(), 1);

    assert_ok!(flow.submit_qr(T1).await);
    assert_eq!(flow.phase(), Phase::CapturingSheet);
    assert!(!flow.is_scanning());
    assert_eq!(camera.open_streams(), 0);

    // 拍答题卡时只打开一次摄像头
    assert_ok!(flow.capture_from_camera(&camera).await);
    assert_eq!(camera.opened(), vec!["cam-1", "cam-1"]);
    assert_eq!(camera.open_streams(), 0);
}

#[tokio::test]
async fn test_switch_camera_cycles_devices() {
    let camera = FakeCamera::new(&["Front", "Back", "USB"], &[]);
    let mut flow = flow_with(FixedGrader);

    assert_ok!(flow.start_scanner(&camera).await);
    assert_ok!(flow.switch_camera(&camera).await);
    assert_ok!(flow.switch_camera(&camera).await);
    assert_eq!(camera.opened(), vec!["cam-2", "cam-3", "cam-1"]);
    assert_eq!(camera.open_streams(), 1);

    flow.reset().await;
    assert_eq!(camera.open_streams(), 0);
    assert!(!flow.is_scanning());
}

#[tokio::test]
async fn test_camera_unavailable_falls_back_to_files() {
    let camera = FakeCamera::failing(DeviceError::PermissionDenied);
    let mut flow = flow_with(FixedGrader);

    let err = assert_err!(flow.start_scanner(&camera).await);
    assert!(matches!(err, AppError::Device(DeviceError::PermissionDenied)));
    assert_eq!(flow.phase(), Phase::AwaitingQr);

    assert_ok!(flow.submit_qr(T1).await);
    let added = assert_ok!(flow.capture_from_camera(&camera).await);
    assert!(added.is_none());
    assert_ok!(flow.add_from_files(vec![png_file("p1.png")]));

    let events = flow.drain_events();
    let unavailable = notices(&events)
        .into_iter()
        .filter(|n| matches!(n, Notice::CameraUnavailable(_)))
        .count();
    assert_eq!(unavailable, 2);
}

#[tokio::test]
async fn test_capture_from_camera_adds_frame() {
    let camera = FakeCamera::new(&["Back"], &[]);
    let mut flow = flow_with(FixedGrader);
    assert_ok!(flow.submit_qr(T1).await);

    let added = assert_ok!(flow.capture_from_camera(&camera).await);
    assert!(added.is_some());
    assert_eq!(flow.session().images().len(), 1);
    assert!(flow.session().images().list()[0]
        .name()
        .starts_with("answer-sheet-"));
    assert_eq!(camera.open_streams(), 0);
}

// ========== 会话驱动 ==========

#[tokio::test]
async fn test_driver_scans_and_grades_in_order() {
    let camera = Arc::new(FakeCamera::new(&["Back"], &["garbage", T1]));
    let open_streams = Arc::clone(&camera.open_streams);
    let camera: Arc<dyn Camera> = camera;
    let mut session = SessionDriver::spawn(flow_with(FixedGrader), Some(camera));

    assert_ok!(session.send(Command::StartScanner).await);

    // 扫码成功后进入拍摄阶段
    let mut seen = Vec::new();
    while let Some(event) = session.next_event().await {
        let done = matches!(
            event,
            WorkflowEvent::PhaseChanged {
                to: Phase::CapturingSheet,
                ..
            }
        );
        seen.push(event);
        if done {
            break;
        }
    }
    assert!(matches!(
        seen.first(),
        Some(WorkflowEvent::Notice(Notice::InvalidQr(_)))
    ));
    assert_eq!(open_streams.load(Ordering::SeqCst), 0);

    assert_ok!(session.send(Command::CaptureFromCamera).await);
    assert_ok!(session.send(Command::SubmitImages).await);
    assert_ok!(session.send(Command::ShowDetails).await);

    let (flow, remaining) = assert_ok!(session.shutdown().await);
    assert_eq!(flow.phase(), Phase::ShowingResults);
    assert_eq!(flow.session().images().len(), 1);
    assert!(matches!(
        remaining.last(),
        Some(WorkflowEvent::Navigate(NavigationIntent::ShowDetails { .. }))
    ));
}

#[tokio::test]
async fn test_driver_close_scanner_releases_camera() {
    let camera = Arc::new(FakeCamera::new(&["Back"], &[]));
    let open_streams = Arc::clone(&camera.open_streams);
    let camera: Arc<dyn Camera> = camera;
    let session = SessionDriver::spawn(flow_with(FixedGrader), Some(camera));

    assert_ok!(session.send(Command::StartScanner).await);
    assert_ok!(session.send(Command::CloseScanner).await);

    let (flow, remaining) = assert_ok!(session.shutdown().await);
    assert!(!flow.is_scanning());
    assert_eq!(open_streams.load(Ordering::SeqCst), 0);
    assert_eq!(
        remaining,
        vec![WorkflowEvent::Navigate(NavigationIntent::ExitScanner)]
    );
}

#[tokio::test]
async fn test_driver_submit_qr_while_scanning_stops_scanner() {
    let camera = Arc::new(FakeCamera::new(&["Back"], &[]));
    let open_streams = Arc::clone(&camera.open_streams);
    let camera: Arc<dyn Camera> = camera;
    let session = SessionDriver::spawn(flow_with(FixedGrader), Some(camera));

    assert_ok!(session.send(Command::StartScanner).await);
    assert_ok!(session.send(Command::SubmitQr(T1.to_string())).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let (flow, remaining) = assert_ok!(session.shutdown().await);
    assert_eq!(flow.phase(), Phase::CapturingSheet);
    assert!(!flow.is_scanning());
    assert_eq!(open_streams.load(Ordering::SeqCst), 0);
    assert!(remaining
        .iter()
        .all(|e| !matches!(e, WorkflowEvent::CommandRejected { .. })));
}
