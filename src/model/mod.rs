pub mod common;
pub mod entity;
pub mod node;
pub mod request_context;

pub use common::*;
pub use entity::*;
pub use node::*;
pub use request_context::*;
