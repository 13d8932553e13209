pub mod auth;
pub mod metrics;
pub mod request_id;

pub use auth::{auth_middleware, require_admin, CurrentUser};
pub use metrics::metrics_middleware;
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
