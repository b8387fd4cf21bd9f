pub mod service;

pub use service::{MonitoringService, WebsiteStatusReport};
