pub mod classify;
pub mod defaults;
pub mod process;

pub use classify::classify_object;
pub use defaults::show_defaults;
pub use process::process_file;
