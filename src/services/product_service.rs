use std::sync::Arc;
use tracing::instrument;

use crate::models::{Product, ProductDraft, ServiceError, ServiceResult, Validate};
use crate::repositories::ProductRepository;

/// Service for managing catalog products
pub struct ProductService {
    repository: Arc<dyn ProductRepository>,
}

impl ProductService {
    pub fn new(repository: Arc<dyn ProductRepository>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        let products = self.repository.find_all().await?;
        crate::info_with_trace!("Listed {} products", products.len());
        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &str) -> ServiceResult<Product> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound { id: id.to_string() })
    }

    #[instrument(skip(self, draft))]
    pub async fn create_product(&self, draft: ProductDraft) -> ServiceResult<Product> {
        let fields = draft
            .validate()
            .map_err(|e| ServiceError::validation("Product", e))?;

        let product = self.repository.create(Product::new(fields)).await?;
        crate::info_with_trace!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Replace every field of product `id`; the draft must be a complete product
    #[instrument(skip(self, draft), fields(product_id = %id))]
    pub async fn update_product(&self, id: &str, draft: ProductDraft) -> ServiceResult<Product> {
        let fields = draft
            .validate()
            .map_err(|e| ServiceError::validation("Product", e))?;

        self.repository
            .replace(Product::with_id(id.to_string(), fields))
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound { id: id.to_string() })
    }

    /// Delete product `id`, returning the removed document. Cart items that
    /// reference it are left in place.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &str) -> ServiceResult<Product> {
        let deleted = self
            .repository
            .delete(id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound { id: id.to_string() })?;

        crate::info_with_trace!(product_id = %id, "Product deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepositoryError;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    mock! {
        TestProductRepository {}

        #[async_trait]
        impl ProductRepository for TestProductRepository {
            async fn find_all(&self) -> Result<Vec<Product>, RepositoryError>;
            async fn find_by_id(&self, id: &str) -> Result<Option<Product>, RepositoryError>;
            async fn create(&self, product: Product) -> Result<Product, RepositoryError>;
            async fn replace(&self, product: Product) -> Result<Option<Product>, RepositoryError>;
            async fn delete(&self, id: &str) -> Result<Option<Product>, RepositoryError>;
        }
    }

    fn macbook_draft() -> ProductDraft {
        ProductDraft {
            name: Some("Macbook Pro".to_string()),
            price: Some(dec!(2000)),
            description: Some("A great laptop".to_string()),
            image: Some("https://img.example.com/macbook.png".to_string()),
            category: Some("Electronics".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_product_assigns_id() {
        let mut repo = MockTestProductRepository::new();
        repo.expect_create().times(1).returning(Ok);

        let service = ProductService::new(Arc::new(repo));
        let product = service.create_product(macbook_draft()).await.unwrap();

        assert!(!product.id.is_empty());
        assert_eq!(product.name, "Macbook Pro");
        assert_eq!(product.price, dec!(2000));
    }

    #[tokio::test]
    async fn test_create_product_missing_field_never_reaches_repository() {
        let mut repo = MockTestProductRepository::new();
        repo.expect_create().times(0);

        let service = ProductService::new(Arc::new(repo));
        let draft = ProductDraft {
            category: None,
            ..macbook_draft()
        };

        match service.create_product(draft).await.unwrap_err() {
            ServiceError::ValidationError { entity, message } => {
                assert_eq!(entity, "Product");
                assert!(message.contains("category"));
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_product_not_found() {
        let mut repo = MockTestProductRepository::new();
        repo.expect_find_by_id()
            .with(eq("missing"))
            .times(1)
            .returning(|_| Ok(None));

        let service = ProductService::new(Arc::new(repo));
        let err = service.get_product("missing").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Product not found");
    }

    #[tokio::test]
    async fn test_update_product_keeps_path_id() {
        let mut repo = MockTestProductRepository::new();
        repo.expect_replace()
            .withf(|product| product.id == "p-1" && product.price == dec!(1500))
            .times(1)
            .returning(|product| Ok(Some(product)));

        let service = ProductService::new(Arc::new(repo));
        let draft = ProductDraft {
            price: Some(dec!(1500)),
            ..macbook_draft()
        };

        let updated = service.update_product("p-1", draft).await.unwrap();
        assert_eq!(updated.id, "p-1");
    }

    #[tokio::test]
    async fn test_update_product_not_found() {
        let mut repo = MockTestProductRepository::new();
        repo.expect_replace().times(1).returning(|_| Ok(None));

        let service = ProductService::new(Arc::new(repo));
        let err = service
            .update_product("ghost", macbook_draft())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::ProductNotFound { id } if id == "ghost"));
    }

    #[tokio::test]
    async fn test_delete_product_returns_old_document() {
        let mut repo = MockTestProductRepository::new();
        let existing = Product::with_id("p-9".to_string(), macbook_draft().validate().unwrap());
        let returned = existing.clone();
        repo.expect_delete()
            .with(eq("p-9"))
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));

        let service = ProductService::new(Arc::new(repo));
        assert_eq!(service.delete_product("p-9").await.unwrap(), existing);
    }

    #[tokio::test]
    async fn test_repository_error_passes_through() {
        let mut repo = MockTestProductRepository::new();
        repo.expect_find_all().times(1).returning(|| {
            Err(RepositoryError::AwsSdk {
                message: "throttled".to_string(),
            })
        });

        let service = ProductService::new(Arc::new(repo));
        let err = service.list_products().await.unwrap_err();

        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "AWS SDK error: throttled");
    }
}
