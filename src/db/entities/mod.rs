//! SeaORM entities for the protection orchestrator.
//!
//! Each entity maps to one table; relations enforce the foreign-key
//! invariant that every Check/Backup/SecurityScan belongs to a Website.

pub mod alert;
pub mod backup;
pub mod check;
pub mod security_scan;
pub mod user;
pub mod website;

// Prelude module for easy importing of all entities and their related types
pub mod prelude {
    pub use super::user::Entity as User;
    pub use super::user::Model as UserModel;
    pub use super::user::ActiveModel as UserActiveModel;
    pub use super::user::Column as UserColumn;

    pub use super::website::Entity as Website;
    pub use super::website::Model as WebsiteModel;
    pub use super::website::ActiveModel as WebsiteActiveModel;
    pub use super::website::Column as WebsiteColumn;

    pub use super::check::Entity as Check;
    pub use super::check::Model as CheckModel;
    pub use super::check::ActiveModel as CheckActiveModel;
    pub use super::check::Column as CheckColumn;

    pub use super::backup::Entity as Backup;
    pub use super::backup::Model as BackupModel;
    pub use super::backup::ActiveModel as BackupActiveModel;
    pub use super::backup::Column as BackupColumn;

    pub use super::security_scan::Entity as SecurityScan;
    pub use super::security_scan::Model as SecurityScanModel;
    pub use super::security_scan::ActiveModel as SecurityScanActiveModel;
    pub use super::security_scan::Column as SecurityScanColumn;

    pub use super::alert::Entity as Alert;
    pub use super::alert::Model as AlertModel;
    pub use super::alert::ActiveModel as AlertActiveModel;
    pub use super::alert::Column as AlertColumn;
}
