//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted room identifier.
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Validates a room identifier taken from a path or a payload.
///
/// ```ignore
/// validate_room_id("ab12")   // Ok
/// validate_room_id("")       // Err - empty
/// validate_room_id("ab/12")  // Err - path separator
/// ```
pub fn validate_room_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        let mut err = ValidationError::new("room_id_empty");
        err.message = Some("room id is required".into());
        return Err(err);
    }

    if id.len() > MAX_ROOM_ID_LEN {
        let mut err = ValidationError::new("room_id_length");
        err.message = Some(
            format!(
                "room id must be at most {MAX_ROOM_ID_LEN} bytes (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        let mut err = ValidationError::new("room_id_format");
        err.message = Some("room id must not contain path separators".into());
        return Err(err);
    }

    Ok(())
}
