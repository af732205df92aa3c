use uuid::Uuid;

pub type Id = String;

/// Type tag carried in the envelope of every template document.
pub const TEMPLATE_TYPE: &str = "io.murano.Template";
/// Type tag carried in the envelope of every environment document.
pub const ENVIRONMENT_TYPE: &str = "io.murano.Environment";

/// Top-level collections a document may hold. Asking for one of these on a
/// document that never had it is a model error, not a missing path.
pub const COLLECTIONS: &[&str] = &["services"];

/// Opaque, collision resistant identity (32 lowercase hex characters).
pub fn generate_id() -> Id {
    Uuid::new_v4().simple().to_string()
}
