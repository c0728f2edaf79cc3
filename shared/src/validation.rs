//! Validation utilities for the AgroTIC platform
//!
//! Includes Colombia-specific checks for identity documents and phone numbers.

use rust_decimal::Decimal;

use crate::error::DomainError;

/// Largest value a `NUMERIC(14, 2)` column holds: quantities, stock, prices
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Largest presentation capacity, stored as `NUMERIC(12, 2)`
pub const MAX_CAPACITY: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

// ============================================================================
// Farm Data Validations
// ============================================================================

/// Validate a quantity is strictly positive
pub fn validate_positive(value: Decimal) -> Result<(), &'static str> {
    if value <= Decimal::ZERO {
        return Err("Value must be greater than zero");
    }
    Ok(())
}

/// Validate a quantity or price is not negative
pub fn validate_non_negative(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Value cannot be negative");
    }
    Ok(())
}

/// Reject magnitudes the storage column cannot represent
pub fn validate_amount(field: &'static str, value: Decimal, max: Decimal) -> Result<(), DomainError> {
    if value.abs() > max {
        return Err(DomainError::OutOfRange { field, value, max });
    }
    Ok(())
}

/// Validate a crop record code (ficha): 1-30 chars, alphanumeric plus `-`/`_`
pub fn validate_ficha(ficha: &str) -> Result<(), &'static str> {
    let ficha = ficha.trim();
    if ficha.is_empty() {
        return Err("Ficha is required");
    }
    if ficha.len() > 30 {
        return Err("Ficha must be at most 30 characters");
    }
    if !ficha
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Ficha may only contain letters, digits, '-' and '_'");
    }
    Ok(())
}

/// Validate a sensor key such as `temperatura` or `humedad_suelo`
pub fn validate_sensor_key(key: &str) -> Result<(), &'static str> {
    if key.is_empty() {
        return Err("Sensor key is required");
    }
    if key.len() > 50 {
        return Err("Sensor key must be at most 50 characters");
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err("Sensor key may only contain letters, digits, '_', '-' and '.'");
    }
    Ok(())
}

/// Validate an MQTT topic base: no wildcards, no empty levels
pub fn validate_topic_base(topic: &str) -> Result<(), &'static str> {
    if topic.is_empty() {
        return Err("Topic is required");
    }
    if topic.contains('#') || topic.contains('+') {
        return Err("Topic base cannot contain wildcards");
    }
    if topic.split('/').any(|level| level.is_empty()) {
        return Err("Topic base cannot contain empty levels");
    }
    Ok(())
}

/// Validate a TCP port number
pub fn validate_port(port: i32) -> Result<(), &'static str> {
    if !(1..=65535).contains(&port) {
        return Err("Port must be between 1 and 65535");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("Invalid email format");
    }
    if email.chars().any(char::is_whitespace) {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) || !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain letters and digits");
    }
    Ok(())
}

// ============================================================================
// Colombia-Specific Validations
// ============================================================================

/// Validate a cédula (DNI) number: 6 to 10 digits, no leading zero
pub fn validate_dni(dni: i64) -> Result<(), &'static str> {
    if !(100_000..=9_999_999_999).contains(&dni) {
        return Err("DNI must have between 6 and 10 digits");
    }
    Ok(())
}

/// Validate a Colombian mobile number
/// Accepts: 3001234567, 300 123 4567, +57 300 123 4567
pub fn validate_colombian_phone(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() == 10 && digits.starts_with('3') {
        return Ok(());
    }
    if digits.len() == 12 && digits.starts_with("573") {
        return Ok(());
    }

    Err("Invalid Colombian phone number format")
}

/// Normalize a Colombian mobile to its 10 national digits
pub fn normalize_colombian_phone(phone: &str) -> Option<String> {
    validate_colombian_phone(phone).ok()?;
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    Some(digits[digits.len() - 10..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_limits() {
        assert_eq!(MAX_AMOUNT.to_string(), "999999999999.99");
        assert_eq!(MAX_CAPACITY.to_string(), "9999999999.99");
        assert!(validate_amount("cantidad", MAX_AMOUNT, MAX_AMOUNT).is_ok());
        assert!(validate_amount("cantidad", -MAX_AMOUNT, MAX_AMOUNT).is_ok());
        let over = MAX_AMOUNT + Decimal::new(1, 2);
        assert_eq!(
            validate_amount("precio_unitario", over, MAX_AMOUNT),
            Err(DomainError::OutOfRange {
                field: "precio_unitario",
                value: over,
                max: MAX_AMOUNT,
            })
        );
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("aprendiz@sena.edu.co").is_ok());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("@sena.edu.co").is_err());
        assert!(validate_email("user@localhost").is_err());
        assert!(validate_email("a b@x.co").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("agrotic2025").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("onlyletters").is_err());
    }

    #[test]
    fn test_validate_dni() {
        assert!(validate_dni(1_234_567).is_ok());
        assert!(validate_dni(99_999).is_err());
        assert!(validate_dni(12_345_678_901).is_err());
    }

    #[test]
    fn test_validate_colombian_phone() {
        assert!(validate_colombian_phone("3001234567").is_ok());
        assert!(validate_colombian_phone("300 123 4567").is_ok());
        assert!(validate_colombian_phone("+57 300 123 4567").is_ok());
        assert!(validate_colombian_phone("6012345678").is_err());
        assert_eq!(
            normalize_colombian_phone("+57 300 123 4567").as_deref(),
            Some("3001234567")
        );
    }

    #[test]
    fn test_validate_topic_base() {
        assert!(validate_topic_base("agrotic/invernadero1").is_ok());
        assert!(validate_topic_base("agrotic/#").is_err());
        assert!(validate_topic_base("agrotic//x").is_err());
    }

    #[test]
    fn test_validate_ficha_and_key() {
        assert!(validate_ficha("2871234-A").is_ok());
        assert!(validate_ficha("  ").is_err());
        assert!(validate_sensor_key("humedad_suelo").is_ok());
        assert!(validate_sensor_key("humedad suelo").is_err());
    }

    #[test]
    fn test_validate_port_and_amounts() {
        assert!(validate_port(1883).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_positive(Decimal::ZERO).is_err());
        assert!(validate_non_negative(Decimal::ZERO).is_ok());
    }
}
