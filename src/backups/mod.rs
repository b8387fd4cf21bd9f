pub mod service;
pub mod storage;
pub mod transport;

pub use service::BackupService;
pub use storage::{BackupStorage, ObjectStore};
