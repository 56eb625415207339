pub mod carts;
pub mod error;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod products;
pub mod users;

pub use error::{service_error_to_response, HandlerResult};
pub use health::*;
pub use metrics::*;
pub use middleware::*;
