use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{require_price, require_text, Validate};
use super::ValidationResult;

/// Catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub description: String,
    pub image: String,
    pub category: String,
}

/// Product fields as submitted by a client. Every field is required once
/// validated; missing ones are reported by `validate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
}

/// Validated product fields, not yet bound to an id
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFields {
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub image: String,
    pub category: String,
}

impl Validate for ProductDraft {
    type Output = ProductFields;

    fn validate(&self) -> ValidationResult<ProductFields> {
        Ok(ProductFields {
            name: require_text("name", &self.name)?,
            price: require_price("price", &self.price)?,
            description: require_text("description", &self.description)?,
            image: require_text("image", &self.image)?,
            category: require_text("category", &self.category)?,
        })
    }
}

impl Product {
    /// Create a product with a freshly generated id
    pub fn new(fields: ProductFields) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), fields)
    }

    /// Bind validated fields to an existing id (full replacement)
    pub fn with_id(id: String, fields: ProductFields) -> Self {
        Self {
            id,
            name: fields.name,
            price: fields.price,
            description: fields.description,
            image: fields.image,
            category: fields.category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationError;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn macbook_draft() -> ProductDraft {
        serde_json::from_value(json!({
            "name": "Macbook Pro",
            "price": 2000,
            "description": "A great laptop",
            "image": "https://img.example.com/macbook.png",
            "category": "Electronics"
        }))
        .unwrap()
    }

    #[test]
    fn test_draft_from_json_number_price() {
        let draft = macbook_draft();
        assert_eq!(draft.price, Some(dec!(2000)));
        assert_eq!(draft.name.as_deref(), Some("Macbook Pro"));
    }

    #[test]
    fn test_validate_complete_draft() {
        let fields = macbook_draft().validate().unwrap();
        let product = Product::new(fields);

        assert!(!product.id.is_empty());
        assert_eq!(product.name, "Macbook Pro");
        assert_eq!(product.category, "Electronics");
    }

    #[test]
    fn test_validate_reports_each_missing_field() {
        for field in ["name", "price", "description", "image", "category"] {
            let mut value = serde_json::to_value(macbook_draft()).unwrap();
            value.as_object_mut().unwrap().remove(field);
            let draft: ProductDraft = serde_json::from_value(value).unwrap();

            assert_eq!(
                draft.validate().unwrap_err(),
                ValidationError::RequiredField {
                    field: field.to_string()
                },
                "missing {} should be rejected",
                field
            );
        }
    }

    #[test]
    fn test_product_serializes_with_document_id() {
        let product = Product::with_id("abc".to_string(), macbook_draft().validate().unwrap());
        let value = serde_json::to_value(&product).unwrap();

        assert_eq!(value["_id"], "abc");
        assert_eq!(value["price"], json!(2000.0));
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let fields = macbook_draft().validate().unwrap();
        let a = Product::new(fields.clone());
        let b = Product::new(fields);
        assert_ne!(a.id, b.id);
    }
}
