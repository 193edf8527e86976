//! The Configuration Manager: typed, versioned categories with schema
//! validation, a merge law for schema upgrades, and observer dispatch.

pub mod manager;
pub mod merge;
pub mod observer;
pub mod validate;

pub use manager::ConfigurationManager;
pub use observer::CategoryObserver;
