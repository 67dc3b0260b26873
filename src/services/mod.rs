pub mod bootstrap_service;
pub mod diagnostics;
pub mod migration_service;
pub mod normalizer;
pub mod relational_store;
pub mod roster_ops;
pub mod roster_service;
pub mod week_snapshot;
