pub mod preview;
pub mod scanner;

pub use preview::{PreviewHandle, PreviewRegistry};
pub use scanner::QrScanner;
