use rust_decimal::Decimal;

use super::{ValidationError, ValidationResult};

/// Trait for validating input models
pub trait Validate {
    type Output;

    fn validate(&self) -> ValidationResult<Self::Output>;
}

pub const MIN_CART_QUANTITY: u32 = 1;

/// Require a non-blank string field
pub fn require_text(field: &str, value: &Option<String>) -> ValidationResult<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text.clone()),
        _ => Err(ValidationError::RequiredField {
            field: field.to_string(),
        }),
    }
}

/// Require a price. Any number is accepted, including zero and negatives.
pub fn require_price(field: &str, value: &Option<Decimal>) -> ValidationResult<Decimal> {
    value.ok_or_else(|| ValidationError::RequiredField {
        field: field.to_string(),
    })
}

/// Require a cart quantity of at least one
pub fn require_quantity(field: &str, value: Option<u32>) -> ValidationResult<u32> {
    let quantity = value.ok_or_else(|| ValidationError::RequiredField {
        field: field.to_string(),
    })?;

    if quantity < MIN_CART_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: MIN_CART_QUANTITY.to_string(),
            value: quantity.to_string(),
        });
    }

    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_require_text() {
        assert_eq!(
            require_text("name", &Some("Macbook".to_string())).unwrap(),
            "Macbook"
        );
        assert_eq!(
            require_text("name", &None).unwrap_err(),
            ValidationError::RequiredField {
                field: "name".to_string()
            }
        );
        assert!(require_text("name", &Some("   ".to_string())).is_err());
    }

    #[test]
    fn test_require_price() {
        assert_eq!(require_price("price", &Some(dec!(0))).unwrap(), dec!(0));
        assert_eq!(
            require_price("price", &Some(dec!(2000))).unwrap(),
            dec!(2000)
        );
        assert_eq!(require_price("price", &Some(dec!(-5))).unwrap(), dec!(-5));
        assert!(matches!(
            require_price("price", &None),
            Err(ValidationError::RequiredField { .. })
        ));
    }

    #[test]
    fn test_require_quantity() {
        assert_eq!(require_quantity("quantity", Some(3)).unwrap(), 3);
        assert!(matches!(
            require_quantity("quantity", Some(0)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(require_quantity("quantity", None).is_err());
    }

    proptest! {
        #[test]
        fn prop_positive_quantities_accepted(quantity in 1u32..100_000) {
            prop_assert_eq!(require_quantity("quantity", Some(quantity)).unwrap(), quantity);
        }

        #[test]
        fn prop_non_blank_text_round_trips(text in "[a-zA-Z0-9][a-zA-Z0-9 ]{0,40}") {
            prop_assert_eq!(require_text("name", &Some(text.clone())).unwrap(), text);
        }
    }
}
