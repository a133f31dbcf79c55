pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryAdapter;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAdapter;
