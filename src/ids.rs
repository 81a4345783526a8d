use sha1::{Digest, Sha1};
use uuid::Builder;

/// Random (version 4) UUID in canonical hyphenated form.
pub fn uuid() -> String {
    Builder::from_random_bytes(rand::random())
        .into_uuid()
        .hyphenated()
        .to_string()
}

/// Stable lowercase hex SHA-1 of a project name.
pub fn project_hash(name: &str) -> String {
    format!("{:x}", Sha1::digest(name.as_bytes()))
}
