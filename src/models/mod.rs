pub mod diagnostics;
pub mod remote;
pub mod roster;
pub mod settings;
