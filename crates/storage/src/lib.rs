#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;
pub mod wire;

pub use repository::{
    InMemoryRepository, SessionRepository, Storage, StorageError, UserRepository,
};
