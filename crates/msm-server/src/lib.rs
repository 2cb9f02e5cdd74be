pub mod auth;
pub mod error;
pub mod file_logging;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
