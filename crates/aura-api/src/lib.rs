pub mod auth;
pub mod error;
pub mod friends;
pub mod matches;
pub mod middleware;
pub mod notifications;
pub mod profiles;
pub mod routes;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use middleware::CurrentUser;
pub use routes::router;
