pub mod app_config;
pub mod database;
pub mod memory;
pub mod postgres;
pub mod seed;

pub use database::DbClient;
pub use memory::MemoryStore;
pub use postgres::PgStore;
