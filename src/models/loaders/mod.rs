pub mod sheet_loader;

pub use sheet_loader::{load_selected_file, load_sheet_folder};
