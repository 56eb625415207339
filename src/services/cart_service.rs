use std::sync::Arc;
use tracing::{instrument, warn};

use crate::models::{
    CartAddition, CartItem, CartItemDraft, CartItemFields, ClearCartResult, RepositoryError,
    ServiceError, ServiceResult, Validate,
};
use crate::repositories::CartRepository;

/// Service for managing shopping-cart line items
pub struct CartService {
    repository: Arc<dyn CartRepository>,
}

impl CartService {
    pub fn new(repository: Arc<dyn CartRepository>) -> Self {
        Self { repository }
    }

    /// Every cart item across all owners
    #[instrument(skip(self))]
    pub async fn list_cart_items(&self) -> ServiceResult<Vec<CartItem>> {
        Ok(self.repository.find_all().await?)
    }

    #[instrument(skip(self), fields(email = %email))]
    pub async fn list_by_owner(&self, email: &str) -> ServiceResult<Vec<CartItem>> {
        let items = self.repository.find_by_email(email).await?;
        crate::info_with_trace!("Cart holds {} items", items.len());
        Ok(items)
    }

    /// Add a line to a cart. When the owner already has a line for the same
    /// product its stored quantity grows by the incoming quantity and no
    /// other stored field changes; otherwise a new line is inserted.
    ///
    /// New lines are keyed by their (product, owner) pair, so a concurrent
    /// insert for the same pair makes ours fail with `AlreadyExists` and the
    /// quantity is merged into the winner instead.
    #[instrument(skip(self, draft))]
    pub async fn add_item(&self, draft: CartItemDraft) -> ServiceResult<CartAddition> {
        let fields = draft
            .validate()
            .map_err(|e| ServiceError::validation("Cart", e))?;

        if let Some(merged) = self.merge_into_existing(&fields).await? {
            return Ok(CartAddition::Merged(merged));
        }

        let created = match self.repository.create(CartItem::new(fields.clone())).await {
            Ok(created) => created,
            Err(RepositoryError::AlreadyExists { key }) => {
                if let Some(merged) = self.merge_into_existing(&fields).await? {
                    return Ok(CartAddition::Merged(merged));
                }
                // The pair id belongs to a line that was since edited to another pair
                warn!(cart_item_id = %key, "Pair id taken by another line");
                self.repository
                    .create(CartItem::with_random_id(fields))
                    .await?
            }
            Err(e) => return Err(e.into()),
        };

        crate::info_with_trace!(cart_item_id = %created.id, "Cart item created");
        Ok(CartAddition::Created(created))
    }

    /// Increment the owner's existing line for the product, if there is one
    async fn merge_into_existing(&self, fields: &CartItemFields) -> ServiceResult<Option<CartItem>> {
        let existing = match self
            .repository
            .find_by_product_and_email(&fields.product_id, &fields.email)
            .await?
        {
            Some(existing) => existing,
            None => return Ok(None),
        };

        let merged = self
            .repository
            .increment_quantity(&existing.id, fields.quantity)
            .await?;

        match &merged {
            Some(merged) => {
                crate::info_with_trace!(
                    cart_item_id = %merged.id,
                    quantity = merged.quantity,
                    "Merged into existing cart item"
                );
            }
            // Deleted between lookup and update; the caller inserts a fresh line
            None => warn!(cart_item_id = %existing.id, "Cart item removed during merge"),
        }

        Ok(merged)
    }

    #[instrument(skip(self, draft), fields(cart_item_id = %id))]
    pub async fn update_item(&self, id: &str, draft: CartItemDraft) -> ServiceResult<CartItem> {
        let fields = draft
            .validate()
            .map_err(|e| ServiceError::validation("Cart", e))?;

        self.repository
            .replace(CartItem::with_id(id.to_string(), fields))
            .await?
            .ok_or_else(|| ServiceError::CartItemNotFound { id: id.to_string() })
    }

    #[instrument(skip(self), fields(cart_item_id = %id))]
    pub async fn delete_item(&self, id: &str) -> ServiceResult<CartItem> {
        self.repository
            .delete(id)
            .await?
            .ok_or_else(|| ServiceError::CartItemNotFound { id: id.to_string() })
    }

    /// Remove every line owned by `email`. Fails with `EmptyCart` when
    /// nothing was removed.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn clear_cart(&self, email: &str) -> ServiceResult<ClearCartResult> {
        let deleted_count = self.repository.delete_by_email(email).await?;

        if deleted_count == 0 {
            return Err(ServiceError::EmptyCart {
                email: email.to_string(),
            });
        }

        crate::info_with_trace!("Cleared {} cart items", deleted_count);
        Ok(ClearCartResult {
            acknowledged: true,
            deleted_count,
        })
    }
}
