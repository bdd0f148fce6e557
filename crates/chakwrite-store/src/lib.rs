pub mod file;
pub mod memory;
pub mod types;

pub use file::FileConfigStore;
pub use memory::MemoryConfigStore;
pub use types::{install_defaults, load_config, remember_selection, ConfigStore};
