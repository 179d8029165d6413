//! Shared primitive types.

/// Document uids are opaque strings (uuid v4 at generation time, but the
/// store never inspects them).
pub type Uid = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh document uid.
pub fn generate_uid() -> Uid {
    uuid::Uuid::new_v4().to_string()
}

/// Actor name recorded in audit fields for internally-triggered writes.
pub const SYSTEM_ACTOR: &str = "system";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_uids_are_unique() {
        assert_ne!(generate_uid(), generate_uid());
    }
}
