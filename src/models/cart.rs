use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{require_price, require_quantity, require_text, Validate};
use super::ValidationResult;

/// One (product, owner, quantity) line in a shopping cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub email: String,
    pub image: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
}

/// Cart line as submitted by a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDraft {
    pub product_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub quantity: Option<u32>,
}

/// Validated cart line fields, not yet bound to an id
#[derive(Debug, Clone, PartialEq)]
pub struct CartItemFields {
    pub product_id: String,
    pub name: String,
    pub email: String,
    pub image: String,
    pub price: Decimal,
    pub quantity: u32,
}

/// Outcome of adding a line to a cart
#[derive(Debug, Clone, PartialEq)]
pub enum CartAddition {
    /// An item for the same product and owner existed; its stored quantity
    /// was incremented.
    Merged(CartItem),
    /// No matching item existed; a new one was inserted.
    Created(CartItem),
}

/// Result of clearing an owner's cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCartResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl Validate for CartItemDraft {
    type Output = CartItemFields;

    fn validate(&self) -> ValidationResult<CartItemFields> {
        Ok(CartItemFields {
            product_id: require_text("productId", &self.product_id)?,
            name: require_text("name", &self.name)?,
            email: require_text("email", &self.email)?,
            image: require_text("image", &self.image)?,
            price: require_price("price", &self.price)?,
            quantity: require_quantity("quantity", self.quantity)?,
        })
    }
}

impl CartItem {
    /// Create a cart item whose id is derived from its (product, owner) pair,
    /// so two inserts for the same pair collide on the same key
    pub fn new(fields: CartItemFields) -> Self {
        Self::with_id(Self::pair_id(&fields.product_id, &fields.email), fields)
    }

    /// Create a cart item with a random id
    pub fn with_random_id(fields: CartItemFields) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), fields)
    }

    pub fn pair_id(product_id: &str, email: &str) -> String {
        let name = format!("{}\0{}", product_id, email);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn with_id(id: String, fields: CartItemFields) -> Self {
        Self {
            id,
            product_id: fields.product_id,
            name: fields.name,
            email: fields.email,
            image: fields.image,
            price: fields.price,
            quantity: fields.quantity,
        }
    }

    /// Whether this line belongs to the given (product, owner) pair
    pub fn matches(&self, product_id: &str, email: &str) -> bool {
        self.product_id == product_id && self.email == email
    }

    /// Total price for this line (price * quantity)
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

impl CartAddition {
    pub fn item(&self) -> &CartItem {
        match self {
            CartAddition::Merged(item) | CartAddition::Created(item) => item,
        }
    }
}
