use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use super::dynamo::{decimal_attr, is_condition_failure, parse_items, string_attr, DynamoTable, Item};
use crate::models::{Product, RepositoryResult};
use crate::observability::Metrics;

/// Trait defining the interface for product data access operations
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// List every product in the catalog
    async fn find_all(&self) -> RepositoryResult<Vec<Product>>;

    /// Find a product by its id
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Product>>;

    /// Insert a new product
    async fn create(&self, product: Product) -> RepositoryResult<Product>;

    /// Replace an existing product. Returns `None` when no product has that id.
    async fn replace(&self, product: Product) -> RepositoryResult<Option<Product>>;

    /// Delete a product, returning the removed document
    async fn delete(&self, id: &str) -> RepositoryResult<Option<Product>>;
}

/// DynamoDB implementation of the ProductRepository trait
pub struct DynamoDbProductRepository {
    table: DynamoTable,
}

impl DynamoDbProductRepository {
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

    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    /// Convert a Product struct to DynamoDB attribute values
    pub fn product_to_item(&self, product: &Product) -> Item {
        let mut item = HashMap::new();

        item.insert("id".to_string(), AttributeValue::S(product.id.clone()));
        item.insert("name".to_string(), AttributeValue::S(product.name.clone()));
        item.insert(
            "price".to_string(),
            AttributeValue::N(product.price.to_string()),
        );
        item.insert(
            "description".to_string(),
            AttributeValue::S(product.description.clone()),
        );
        item.insert("image".to_string(), AttributeValue::S(product.image.clone()));
        item.insert(
            "category".to_string(),
            AttributeValue::S(product.category.clone()),
        );

        item
    }

    /// Convert DynamoDB item to Product struct
    pub fn item_to_product(&self, item: Item) -> RepositoryResult<Product> {
        Ok(Product {
            id: string_attr(&item, "id")?,
            name: string_attr(&item, "name")?,
            price: decimal_attr(&item, "price")?,
            description: string_attr(&item, "description")?,
            image: string_attr(&item, "image")?,
            category: string_attr(&item, "category")?,
        })
    }

    async fn put(&self, product: &Product, condition: &str) -> Result<(), DynamoDbError> {
        let item = self.product_to_item(product);

        self.table
            .call("PutItem", async {
                self.table
                    .client()
                    .put_item()
                    .table_name(self.table.name())
                    .set_item(Some(item))
                    .condition_expression(condition)
                    .send()
                    .await
                    .map_err(DynamoDbError::from)
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ProductRepository for DynamoDbProductRepository {
    #[instrument(skip(self), fields(table = %self.table.name()))]
    async fn find_all(&self) -> RepositoryResult<Vec<Product>> {
        info!("Scanning all products");

        let items = self.table.scan_all(None).await?;
        let products = parse_items(items, "product", |item| self.item_to_product(item))?;
        info!("Found {} products", products.len());
        Ok(products)
    }

    #[instrument(skip(self), fields(table = %self.table.name(), product_id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Product>> {
        self.table
            .fetch(id)
            .await?
            .map(|item| self.item_to_product(item))
            .transpose()
    }

    #[instrument(skip(self, product), fields(table = %self.table.name(), product_id = %product.id))]
    async fn create(&self, product: Product) -> RepositoryResult<Product> {
        info!("Creating product");

        self.put(&product, "attribute_not_exists(id)")
            .await
            .map_err(|e| self.table.map_error(e))?;

        info!("Product created");
        Ok(product)
    }

    #[instrument(skip(self, product), fields(table = %self.table.name(), product_id = %product.id))]
    async fn replace(&self, product: Product) -> RepositoryResult<Option<Product>> {
        match self.put(&product, "attribute_exists(id)").await {
            Ok(()) => {
                info!("Product replaced");
                Ok(Some(product))
            }
            Err(e) if is_condition_failure(&e) => {
                info!("Product not found for replacement");
                Ok(None)
            }
            Err(e) => Err(self.table.map_error(e)),
        }
    }

    #[instrument(skip(self), fields(table = %self.table.name(), product_id = %id))]
    async fn delete(&self, id: &str) -> RepositoryResult<Option<Product>> {
        let response = self
            .table
            .call("DeleteItem", async {
                self.table
                    .client()
                    .delete_item()
                    .table_name(self.table.name())
                    .key("id", AttributeValue::S(id.to_string()))
                    .return_values(ReturnValue::AllOld)
                    .send()
                    .await
                    .map_err(DynamoDbError::from)
            })
            .await
            .map_err(|e| self.table.map_error(e))?;

        response
            .attributes
            .map(|item| self.item_to_product(item))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepositoryError;
    use crate::repositories::dynamo::test_client;
    use rust_decimal_macros::dec;

    fn repo() -> DynamoDbProductRepository {
        DynamoDbProductRepository::new(
            test_client(),
            "test-products".to_string(),
            "us-east-1".to_string(),
        )
    }

    fn sample_product() -> Product {
        Product {
            id: "p-1".to_string(),
            name: "Macbook Pro".to_string(),
            price: dec!(1999.99),
            description: "A great laptop".to_string(),
            image: "https://img.example.com/macbook.png".to_string(),
            category: "Electronics".to_string(),
        }
    }

    #[test]
    fn test_product_to_item_conversion() {
        let item = repo().product_to_item(&sample_product());

        assert_eq!(item.len(), 6);
        if let Some(AttributeValue::N(price)) = item.get("price") {
            assert_eq!(price, "1999.99");
        } else {
            panic!("Expected number value for price");
        }
    }

    #[test]
    fn test_item_to_product_conversion() {
        let repo = repo();
        let product = sample_product();

        let converted = repo.item_to_product(repo.product_to_item(&product)).unwrap();
        assert_eq!(converted, product);
    }

    #[test]
    fn test_item_missing_category_is_rejected() {
        let repo = repo();
        let mut item = repo.product_to_item(&sample_product());
        item.remove("category");

        match repo.item_to_product(item).unwrap_err() {
            RepositoryError::MalformedItem { message } => {
                assert!(message.contains("category"));
            }
            other => panic!("Expected MalformedItem, got {:?}", other),
        }
    }

    #[test]
    fn test_repository_creation() {
        assert_eq!(repo().table_name(), "test-products");
    }
}
