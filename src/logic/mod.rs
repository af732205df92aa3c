pub mod document_service;
pub mod object_model;
pub mod path;
pub mod status;
pub mod traverse;

pub use document_service::*;
pub use object_model::*;
pub use path::*;
pub use status::*;
pub use traverse::*;
