pub mod health;
pub mod index;
pub mod recommendations;

pub use health::health_check;
pub use index::index_page;
pub use recommendations::recommendations_config;
