use super::domain::ListingFields;

/// First field constraint a submission failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

const MIN_MOBILE_LEN: usize = 10;
const MIN_PASSWORD_LEN: usize = 6;

fn min_chars(
    field: &'static str,
    value: &str,
    min: usize,
    message: &str,
) -> Result<(), ValidationError> {
    if value.trim().chars().count() < min {
        Err(ValidationError::new(field, message))
    } else {
        Ok(())
    }
}

/// Loose `local@domain.tld` shape check; delivery is not verified.
pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}

pub fn validate_listing(fields: &ListingFields) -> Result<(), ValidationError> {
    min_chars("title", &fields.title, 5, "Title must be at least 5 chars")?;
    min_chars(
        "description",
        &fields.description,
        10,
        "Description must be at least 10 chars",
    )?;
    if fields.price < 1 {
        return Err(ValidationError::new("price", "Price must be positive"));
    }
    if fields.area < 1 {
        return Err(ValidationError::new("area", "Area must be positive"));
    }
    min_chars("address", &fields.address, 5, "Address is required")
}

pub fn validate_registration(
    mobile: &str,
    password: &str,
    email: Option<&str>,
) -> Result<(), ValidationError> {
    min_chars(
        "mobile",
        mobile,
        MIN_MOBILE_LEN,
        "Mobile number must be at least 10 digits",
    )?;
    if let Some(email) = email {
        if !is_valid_email(email) {
            return Err(ValidationError::new("email", "Invalid email address"));
        }
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            "Password must be at least 6 characters",
        ));
    }
    Ok(())
}

pub fn validate_kyc(
    full_name: &str,
    email: &str,
    government_id_type: &str,
) -> Result<(), ValidationError> {
    min_chars("full_name", full_name, 2, "Full Name is required")?;
    if !is_valid_email(email) {
        return Err(ValidationError::new("email", "Invalid email address"));
    }
    min_chars(
        "government_id_type",
        government_id_type,
        1,
        "ID Type is required",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::domain::PropertyType;

    fn fields() -> ListingFields {
        ListingFields {
            title: "Lake view villa".to_string(),
            description: "Three bedrooms with a garden".to_string(),
            price: 1_500_000,
            area: 2400,
            property_type: PropertyType::House,
            address: "12 Lake Road, Pune".to_string(),
        }
    }

    #[test]
    fn listing_reports_first_violation() {
        assert!(validate_listing(&fields()).is_ok());

        let mut free = fields();
        free.title = "Villa".to_string();
        free.price = 0;
        let err = validate_listing(&free).expect_err("price must be positive");
        assert_eq!(err.field, "price");

        let mut blank = fields();
        blank.title = "  ab  ".to_string();
        let err = validate_listing(&blank).expect_err("title too short");
        assert_eq!(err.field, "title");
        assert_eq!(err.to_string(), "Title must be at least 5 chars");
    }

    #[test]
    fn registration_checks_mobile_email_and_password() {
        assert!(validate_registration("9000000001", "secret1", None).is_ok());
        assert_eq!(
            validate_registration("12345", "secret1", None)
                .expect_err("short mobile")
                .field,
            "mobile"
        );
        assert_eq!(
            validate_registration("9000000001", "secret1", Some("not-an-email"))
                .expect_err("bad email")
                .field,
            "email"
        );
        assert_eq!(
            validate_registration("9000000001", "12345", None)
                .expect_err("short password")
                .field,
            "password"
        );
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email("a@b.co."));
    }
}
