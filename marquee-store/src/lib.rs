pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod memory;
pub mod redis_ledger;
pub mod reservation_repo;
pub mod seat_repo;
pub mod show_repo;

pub use database::DbClient;
pub use memory::{MemoryLedger, MemoryStore};
pub use redis_ledger::RedisLedger;
