use super::response::ApiError;

const MAX_ORG_NAME_LEN: usize = 64;

/// Organization names become resource-name segments, so the `::` hierarchy
/// delimiter and anything outside a conservative identifier set is rejected.
pub fn validate_organization_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("Organization name cannot be empty"));
    }
    if name.len() > MAX_ORG_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Organization name cannot exceed {MAX_ORG_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::bad_request(
            "Organization name can only contain alphanumeric characters, hyphens, and underscores",
        ));
    }
    if name.starts_with('-') || name.starts_with('_') {
        return Err(ApiError::bad_request(
            "Organization name cannot start with a hyphen or underscore",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_organization_name("acme").is_ok());
        assert!(validate_organization_name("acme-corp_2").is_ok());
    }

    #[test]
    fn test_rejects_delimiter_chars() {
        assert!(validate_organization_name("acme::deployer").is_err());
        assert!(validate_organization_name("a b").is_err());
        assert!(validate_organization_name("").is_err());
        assert!(validate_organization_name("-acme").is_err());
    }
}
