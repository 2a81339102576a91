mod process;
mod redirect;

pub use process::execute_process;
pub use redirect::{apply_redirections, FileDescriptionCollector, SavedFileDescriptions};
