pub mod app;
pub mod config;
pub mod decision;
pub mod extractor;
pub mod mailer;
pub mod models;
pub mod producer;
pub mod queue;
pub mod scheduler;
pub mod scraper;
pub mod storage;
pub mod utils;
pub mod worker;

// Re-export commonly used types
pub use app::App;
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
