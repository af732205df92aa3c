pub mod handlers;
pub mod request_extractor;
pub mod routes;

pub use handlers::*;
pub use routes::*;
