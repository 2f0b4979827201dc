pub mod events;
pub mod scan_flow;
pub mod session;

pub use events::{NavigationIntent, Notice, Severity, WorkflowEvent};
pub use scan_flow::{Command, ScanFlow};
pub use session::{Phase, ProgressStep, StepStatus, WorkflowSession};
