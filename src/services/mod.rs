pub mod camera;
pub mod capture_store;
pub mod grader;
pub mod qr_parser;

pub use camera::{Camera, CameraDevice, CameraLease, VideoStream};
pub use capture_store::ImageCaptureStore;
pub use grader::{Grader, MockGrader};
