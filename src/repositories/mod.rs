// Repositories module - data access layer

pub mod cart_repository;
pub mod dynamo;
pub mod product_repository;
pub mod table_manager;
pub mod user_repository;


pub use cart_repository::{CartRepository, DynamoDbCartRepository};
pub use dynamo::DynamoTable;
pub use product_repository::{DynamoDbProductRepository, ProductRepository};
pub use table_manager::TableManager;
pub use user_repository::{DynamoDbUserRepository, UserRepository};
