pub mod snapshot_repository;
pub mod writer;
