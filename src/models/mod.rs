pub mod descriptor;
pub mod grading;
pub mod image;
pub mod loaders;

pub use descriptor::TestDescriptor;
pub use grading::{AnswerChoice, GradingResult, QuestionResult, ScoreSummary, ScoreTier};
pub use image::{CameraFrame, CapturedImage, ImageSource, SelectedFile};
pub use loaders::{load_selected_file, load_sheet_folder};
