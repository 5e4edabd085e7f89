//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted person name.
pub const MAX_PERSON_NAME_LEN: usize = 80;

/// Validates that a person name is present, trimmed and reasonably short.
///
/// # Examples
///
/// ```ignore
/// validate_person_name("Fábio Alves") // Ok
/// validate_person_name("   ")         // Err - blank
/// validate_person_name(" Ana")        // Err - surrounding whitespace
/// ```
pub fn validate_person_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("person_blank");
        err.message = Some("Person name must not be blank".into());
        return Err(err);
    }

    if name.trim() != name {
        let mut err = ValidationError::new("person_whitespace");
        err.message = Some("Person name must not start or end with whitespace".into());
        return Err(err);
    }

    let length = name.chars().count();
    if length > MAX_PERSON_NAME_LEN {
        let mut err = ValidationError::new("person_length");
        err.message = Some(
            format!("Person name must be at most {MAX_PERSON_NAME_LEN} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_person_name_valid() {
        assert!(validate_person_name("Ana").is_ok());
        assert!(validate_person_name("Marcelo dos Santos Dutra").is_ok());
        assert!(validate_person_name("Fábio Alves").is_ok());
    }

    #[test]
    fn test_validate_person_name_blank() {
        assert!(validate_person_name("").is_err());
        assert!(validate_person_name("   ").is_err());
    }

    #[test]
    fn test_validate_person_name_untrimmed() {
        assert!(validate_person_name(" Ana").is_err());
        assert!(validate_person_name("Ana ").is_err());
    }

    #[test]
    fn test_validate_person_name_too_long() {
        let name = "a".repeat(MAX_PERSON_NAME_LEN + 1);
        assert!(validate_person_name(&name).is_err());
        assert!(validate_person_name(&"a".repeat(MAX_PERSON_NAME_LEN)).is_ok());
    }
}
