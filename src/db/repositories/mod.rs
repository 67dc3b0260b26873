pub mod document_repository;
pub mod entry_repository;
pub mod relational_repository;
