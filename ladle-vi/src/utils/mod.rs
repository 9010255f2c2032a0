//! Utility modules for ladle-vi

pub mod db_retry;
pub mod workdir;

pub use db_retry::retry_on_lock;
pub use workdir::WorkDir;
