pub mod service;
pub mod signals;

pub use service::SecurityService;
