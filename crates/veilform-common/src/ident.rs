use uuid::Uuid;

/// Generate a fresh hyphenated UUIDv4 string for row identity.
pub fn generate_uuid() -> String {
    Uuid::new_v4().as_hyphenated().to_string()
}
