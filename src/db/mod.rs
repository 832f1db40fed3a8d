pub mod models;
pub mod store;

pub use models::{NewSale, SaleRow};
pub use store::{BaselineProvider, SaleStore, SqliteStore};
