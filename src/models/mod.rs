use uuid::Uuid;

pub mod message;
pub mod site;

// Re-exports for convenience
pub use message::*;
pub use site::*;

// Helper function to generate ids in the format expected by the store
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
