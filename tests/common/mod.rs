#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};
use tokio::net::TcpListener;

use shopcart_rs::{
    auth::{AuthError, CallerIdentity, IdentityProvider},
    config::ServerConfig,
    create_app,
    models::{CartItem, Product, RepositoryError, RepositoryResult, Role, User},
    observability::Metrics,
    repositories::{CartRepository, ProductRepository, UserRepository},
    services::{CartService, ProductService, UserService},
    AppState,
};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const ADMIN_EMAIL: &str = "root@shop.io";
pub const USER_TOKEN: &str = "user-token";
pub const USER_EMAIL: &str = "ana@shop.io";

/// Ordered in-memory table keyed by document id
struct Table<T> {
    rows: Mutex<Vec<T>>,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    fn all(&self) -> Vec<T> {
        self.rows.lock().unwrap().clone()
    }

    fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.rows.lock().unwrap().iter().find(|row| predicate(row)).cloned()
    }

    fn insert(&self, row: T) -> T {
        self.rows.lock().unwrap().push(row.clone());
        row
    }

    fn update(&self, predicate: impl Fn(&T) -> bool, apply: impl FnOnce(&mut T)) -> Option<T> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.iter_mut().find(|row| predicate(row))?;
        apply(row);
        Some(row.clone())
    }

    fn remove(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let mut rows = self.rows.lock().unwrap();
        let index = rows.iter().position(|row| predicate(row))?;
        Some(rows.remove(index))
    }

    fn remove_all(&self, predicate: impl Fn(&T) -> bool) -> u64 {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| !predicate(row));
        (before - rows.len()) as u64
    }
}

pub struct InMemoryProductRepository {
    table: Table<Product>,
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_all(&self) -> RepositoryResult<Vec<Product>> {
        Ok(self.table.all())
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Product>> {
        Ok(self.table.find(|p| p.id == id))
    }

    async fn create(&self, product: Product) -> RepositoryResult<Product> {
        Ok(self.table.insert(product))
    }

    async fn replace(&self, product: Product) -> RepositoryResult<Option<Product>> {
        let id = product.id.clone();
        Ok(self.table.update(|p| p.id == id, |p| *p = product))
    }

    async fn delete(&self, id: &str) -> RepositoryResult<Option<Product>> {
        Ok(self.table.remove(|p| p.id == id))
    }
}

pub struct InMemoryCartRepository {
    table: Table<CartItem>,
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn find_all(&self) -> RepositoryResult<Vec<CartItem>> {
        Ok(self.table.all())
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Vec<CartItem>> {
        Ok(self
            .table
            .all()
            .into_iter()
            .filter(|item| item.email == email)
            .collect())
    }

    async fn find_by_product_and_email(
        &self,
        product_id: &str,
        email: &str,
    ) -> RepositoryResult<Option<CartItem>> {
        Ok(self.table.find(|item| item.matches(product_id, email)))
    }

    async fn create(&self, item: CartItem) -> RepositoryResult<CartItem> {
        if self.table.find(|stored| stored.id == item.id).is_some() {
            return Err(RepositoryError::AlreadyExists { key: item.id });
        }
        Ok(self.table.insert(item))
    }

    async fn increment_quantity(&self, id: &str, by: u32) -> RepositoryResult<Option<CartItem>> {
        Ok(self.table.update(|item| item.id == id, |item| item.quantity += by))
    }

    async fn replace(&self, item: CartItem) -> RepositoryResult<Option<CartItem>> {
        let id = item.id.clone();
        Ok(self.table.update(|stored| stored.id == id, |stored| *stored = item))
    }

    async fn delete(&self, id: &str) -> RepositoryResult<Option<CartItem>> {
        Ok(self.table.remove(|item| item.id == id))
    }

    async fn delete_by_email(&self, email: &str) -> RepositoryResult<u64> {
        Ok(self.table.remove_all(|item| item.email == email))
    }
}

pub struct InMemoryUserRepository {
    table: Table<User>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_all(&self) -> RepositoryResult<Vec<User>> {
        Ok(self.table.all())
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        Ok(self.table.find(|u| u.id == id))
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        Ok(self.table.find(|u| u.email == email))
    }

    async fn create(&self, user: User) -> RepositoryResult<User> {
        if self.table.find(|u| u.email == user.email).is_some() {
            return Err(RepositoryError::AlreadyExists { key: user.email });
        }
        Ok(self.table.insert(user))
    }

    async fn replace(&self, user: User) -> RepositoryResult<Option<User>> {
        let id = user.id.clone();
        Ok(self.table.update(|u| u.id == id, |u| *u = user))
    }

    async fn set_role(&self, id: &str, role: Role) -> RepositoryResult<Option<User>> {
        Ok(self.table.update(|u| u.id == id, |u| u.role = role))
    }

    async fn delete(&self, id: &str) -> RepositoryResult<Option<User>> {
        Ok(self.table.remove(|u| u.id == id))
    }
}

/// Accepts a fixed set of tokens
pub struct StaticIdentityProvider {
    tokens: HashMap<String, String>,
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        self.tokens
            .get(token)
            .map(|email| CallerIdentity {
                email: email.clone(),
            })
            .ok_or(AuthError::InvalidToken)
    }
}

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub carts: Arc<InMemoryCartRepository>,
    pub users: Arc<InMemoryUserRepository>,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let products = Arc::new(InMemoryProductRepository {
            table: Table::new(),
        });
        let carts = Arc::new(InMemoryCartRepository {
            table: Table::new(),
        });
        let users = Arc::new(InMemoryUserRepository {
            table: Table::new(),
        });

        let identity = StaticIdentityProvider {
            tokens: HashMap::from([
                (ADMIN_TOKEN.to_string(), ADMIN_EMAIL.to_string()),
                (USER_TOKEN.to_string(), USER_EMAIL.to_string()),
            ]),
        };

        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let state = AppState::new(
            Arc::new(ProductService::new(products)),
            Arc::new(CartService::new(carts.clone())),
            Arc::new(UserService::new(users.clone())),
            Arc::new(identity),
            metrics,
        );

        let server = ServerConfig::from_vars(config::Map::new()).expect("Failed to load config");
        let app = create_app(state, &server);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        // 302 is a status signal here, not a redirect to follow
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .expect("Failed to build client");

        Self {
            client,
            base_url,
            carts,
            users,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register a user directly in the store, bypassing the API
    pub async fn seed_user(&self, email: &str, role: Role) -> User {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: Some("Seeded".to_string()),
            email: email.to_string(),
            photo_url: shopcart_rs::models::DEFAULT_PHOTO_URL.to_string(),
            role,
        };
        self.users.create(user).await.expect("Failed to seed user")
    }
}
