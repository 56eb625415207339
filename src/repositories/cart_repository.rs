use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue, TransactWriteItem};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use super::dynamo::{
    decimal_attr, is_condition_failure, parse_items, string_attr, string_set_attr, u32_attr,
    DynamoTable, Item,
};
use crate::models::{CartItem, RepositoryError, RepositoryResult};
use crate::observability::Metrics;

const OWNER_PREFIX: &str = "owner#";
/// String set on an owner marker listing the ids of that owner's lines
const LINE_IDS: &str = "line_ids";
/// Holds for cart lines only, never for owner markers
const IS_LINE: &str = "attribute_exists(product_id)";

/// Key of the marker item that tracks which lines an owner has
pub fn owner_key(email: &str) -> String {
    format!("{}{}", OWNER_PREFIX, email)
}

/// Trait defining the interface for cart data access operations
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// List every cart item across all owners
    async fn find_all(&self) -> RepositoryResult<Vec<CartItem>>;

    /// List the items owned by `email`
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Vec<CartItem>>;

    /// Find the item for a (product, owner) pair, if any
    async fn find_by_product_and_email(
        &self,
        product_id: &str,
        email: &str,
    ) -> RepositoryResult<Option<CartItem>>;

    /// Insert a new cart item. Fails with `AlreadyExists` when its id is taken.
    async fn create(&self, item: CartItem) -> RepositoryResult<CartItem>;

    /// Atomically add `by` to the stored quantity of item `id`.
    /// Returns `None` when the item no longer exists.
    async fn increment_quantity(&self, id: &str, by: u32) -> RepositoryResult<Option<CartItem>>;

    /// Replace an existing cart item. Returns `None` when no item has that id.
    async fn replace(&self, item: CartItem) -> RepositoryResult<Option<CartItem>>;

    /// Delete a single item, returning the removed document
    async fn delete(&self, id: &str) -> RepositoryResult<Option<CartItem>>;

    /// Delete every item owned by `email`, returning how many were removed
    async fn delete_by_email(&self, email: &str) -> RepositoryResult<u64>;
}

/// DynamoDB implementation of the CartRepository trait
pub struct DynamoDbCartRepository {
    table: DynamoTable,
}

impl DynamoDbCartRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            table: DynamoTable::new(client, table_name, region),
        }
    }

    pub fn with_metrics(self, metrics: Arc<Metrics>) -> Self {
        Self {
            table: self.table.with_metrics(metrics),
        }
    }

    /// Get the table name (for testing)
    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    /// Convert a CartItem struct to DynamoDB attribute values
    pub fn cart_item_to_item(&self, cart_item: &CartItem) -> Item {
        let mut item = HashMap::new();

        item.insert("id".to_string(), AttributeValue::S(cart_item.id.clone()));
        item.insert(
            "product_id".to_string(),
            AttributeValue::S(cart_item.product_id.clone()),
        );
        item.insert("name".to_string(), AttributeValue::S(cart_item.name.clone()));
        item.insert("email".to_string(), AttributeValue::S(cart_item.email.clone()));
        item.insert("image".to_string(), AttributeValue::S(cart_item.image.clone()));
        item.insert(
            "price".to_string(),
            AttributeValue::N(cart_item.price.to_string()),
        );
        item.insert(
            "quantity".to_string(),
            AttributeValue::N(cart_item.quantity.to_string()),
        );

        item
    }

    /// Convert DynamoDB item to CartItem struct
    pub fn item_to_cart_item(&self, item: Item) -> RepositoryResult<CartItem> {
        Ok(CartItem {
            id: string_attr(&item, "id")?,
            product_id: string_attr(&item, "product_id")?,
            name: string_attr(&item, "name")?,
            email: string_attr(&item, "email")?,
            image: string_attr(&item, "image")?,
            price: decimal_attr(&item, "price")?,
            quantity: u32_attr(&item, "quantity")?,
        })
    }

    fn membership_action(
        &self,
        email: &str,
        id: &str,
        add: bool,
    ) -> RepositoryResult<TransactWriteItem> {
        let verb = if add { "ADD" } else { "DELETE" };
        self.table.update_action(
            &owner_key(email),
            &format!("{} {} :ids", verb, LINE_IDS),
            HashMap::from([(":ids".to_string(), AttributeValue::Ss(vec![id.to_string()]))]),
        )
    }

    /// Put the line only if its id is free and list it under its owner
    pub fn create_actions(&self, cart_item: &CartItem) -> RepositoryResult<Vec<TransactWriteItem>> {
        Ok(vec![
            self.table
                .put_action(self.cart_item_to_item(cart_item), "attribute_not_exists(id)")?,
            self.membership_action(&cart_item.email, &cart_item.id, true)?,
        ])
    }

    /// Overwrite `current` with `replacement`, moving the line to the new
    /// owner's marker when the email changed
    pub fn replace_actions(
        &self,
        current: &CartItem,
        replacement: &CartItem,
    ) -> RepositoryResult<Vec<TransactWriteItem>> {
        let mut actions = vec![self
            .table
            .put_action(self.cart_item_to_item(replacement), IS_LINE)?];

        if current.email != replacement.email {
            actions.push(self.membership_action(&current.email, &current.id, false)?);
            actions.push(self.membership_action(&replacement.email, &replacement.id, true)?);
        }

        Ok(actions)
    }

    pub fn delete_actions(&self, current: &CartItem) -> RepositoryResult<Vec<TransactWriteItem>> {
        Ok(vec![
            self.table.delete_action(&current.id, Some(IS_LINE))?,
            self.membership_action(&current.email, &current.id, false)?,
        ])
    }

    async fn find_line(&self, id: &str) -> RepositoryResult<Option<CartItem>> {
        match self.table.fetch(id).await? {
            Some(item) if item.contains_key("product_id") => self.item_to_cart_item(item).map(Some),
            _ => Ok(None),
        }
    }

    async fn owner_line_ids(&self, email: &str) -> RepositoryResult<Vec<String>> {
        Ok(self
            .table
            .fetch(&owner_key(email))
            .await?
            .map(|marker| string_set_attr(&marker, LINE_IDS))
            .unwrap_or_default())
    }

    /// Drop `ids` from the owner's marker, leaving lines added since untouched
    async fn forget_lines(&self, email: &str, ids: Vec<String>) -> RepositoryResult<()> {
        self.table
            .call("UpdateItem", async {
                self.table
                    .client()
                    .update_item()
                    .table_name(self.table.name())
                    .key("id", AttributeValue::S(owner_key(email)))
                    .update_expression(format!("DELETE {} :ids", LINE_IDS))
                    .expression_attribute_values(":ids", AttributeValue::Ss(ids))
                    .send()
                    .await
                    .map_err(DynamoDbError::from)
            })
            .await
            .map_err(|e| self.table.map_error(e))?;

        Ok(())
    }
}

#[async_trait]
impl CartRepository for DynamoDbCartRepository {
    #[instrument(skip(self), fields(table = %self.table.name()))]
    async fn find_all(&self) -> RepositoryResult<Vec<CartItem>> {
        info!("Finding all cart items");

        let items = self.table.scan_all(Some(IS_LINE)).await?;
        let cart_items = parse_items(items, "cart", |item| self.item_to_cart_item(item))?;
        info!("Found {} cart items", cart_items.len());
        Ok(cart_items)
    }

    #[instrument(skip(self), fields(table = %self.table.name(), email = %email))]
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Vec<CartItem>> {
        let ids = self.owner_line_ids(email).await?;
        let items = self.table.batch_get(&ids).await?;
        let cart_items = parse_items(items, "cart", |item| self.item_to_cart_item(item))?;

        info!("Cart has {} items", cart_items.len());
        Ok(cart_items)
    }

    #[instrument(skip(self), fields(table = %self.table.name(), product_id = %product_id, email = %email))]
    async fn find_by_product_and_email(
        &self,
        product_id: &str,
        email: &str,
    ) -> RepositoryResult<Option<CartItem>> {
        Ok(self
            .find_by_email(email)
            .await?
            .into_iter()
            .find(|item| item.matches(product_id, email)))
    }

    #[instrument(skip(self, cart_item), fields(table = %self.table.name(), cart_item_id = %cart_item.id))]
    async fn create(&self, cart_item: CartItem) -> RepositoryResult<CartItem> {
        info!("Inserting cart item");

        match self.table.transact(self.create_actions(&cart_item)?).await {
            Ok(()) => Ok(cart_item),
            Err(e) if is_condition_failure(&e) => Err(RepositoryError::AlreadyExists {
                key: cart_item.id,
            }),
            Err(e) => Err(self.table.map_error(e)),
        }
    }

    #[instrument(skip(self), fields(table = %self.table.name(), cart_item_id = %id, by = by))]
    async fn increment_quantity(&self, id: &str, by: u32) -> RepositoryResult<Option<CartItem>> {
        let result = self
            .table
            .call("UpdateItem", async {
                self.table
                    .client()
                    .update_item()
                    .table_name(self.table.name())
                    .key("id", AttributeValue::S(id.to_string()))
                    .update_expression("ADD quantity :by")
                    .condition_expression(IS_LINE)
                    .expression_attribute_values(":by", AttributeValue::N(by.to_string()))
                    .return_values(ReturnValue::AllNew)
                    .send()
                    .await
                    .map_err(DynamoDbError::from)
            })
            .await;

        match result {
            Ok(response) => response
                .attributes
                .map(|item| self.item_to_cart_item(item))
                .transpose(),
            Err(e) if is_condition_failure(&e) => {
                info!("Cart item vanished before increment");
                Ok(None)
            }
            Err(e) => Err(self.table.map_error(e)),
        }
    }

    #[instrument(skip(self, cart_item), fields(table = %self.table.name(), cart_item_id = %cart_item.id))]
    async fn replace(&self, cart_item: CartItem) -> RepositoryResult<Option<CartItem>> {
        let current = match self.find_line(&cart_item.id).await? {
            Some(current) => current,
            None => return Ok(None),
        };

        match self
            .table
            .transact(self.replace_actions(&current, &cart_item)?)
            .await
        {
            Ok(()) => Ok(Some(cart_item)),
            Err(e) if is_condition_failure(&e) => Ok(None),
            Err(e) => Err(self.table.map_error(e)),
        }
    }

    #[instrument(skip(self), fields(table = %self.table.name(), cart_item_id = %id))]
    async fn delete(&self, id: &str) -> RepositoryResult<Option<CartItem>> {
        let current = match self.find_line(id).await? {
            Some(current) => current,
            None => return Ok(None),
        };

        match self.table.transact(self.delete_actions(&current)?).await {
            Ok(()) => Ok(Some(current)),
            Err(e) if is_condition_failure(&e) => Ok(None),
            Err(e) => Err(self.table.map_error(e)),
        }
    }

    #[instrument(skip(self), fields(table = %self.table.name(), email = %email))]
    async fn delete_by_email(&self, email: &str) -> RepositoryResult<u64> {
        let ids = self.owner_line_ids(email).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = self.table.batch_delete(&ids).await?;
        self.forget_lines(email, ids).await?;

        info!("Deleted {} cart items", deleted);
        Ok(deleted)
    }
}
