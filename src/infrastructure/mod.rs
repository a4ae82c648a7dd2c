//! 基础设施层：持有网络客户端与本地存储，只暴露能力

pub mod gateway;
pub mod kv_store;

pub use gateway::{FetchGateway, GatewayError};
pub use kv_store::{FileStore, KeyValueStore, MemoryStore};
