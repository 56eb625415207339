use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue, TransactWriteItem};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::dynamo::{
    failed_conditions, is_condition_failure, optional_string_attr, parse_items, string_attr,
    DynamoTable, Item,
};
use crate::models::{RepositoryError, RepositoryResult, Role, User};
use crate::observability::Metrics;

const CLAIM_PREFIX: &str = "email#";
/// Holds for user rows only, never for email claims
const IS_USER: &str = "attribute_exists(email)";

/// Key of the claim item that reserves `email` for a single user
pub fn claim_key(email: &str) -> String {
    format!("{}{}", CLAIM_PREFIX, email)
}

/// Trait defining the interface for user data access operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_all(&self) -> RepositoryResult<Vec<User>>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;

    /// Find the user registered with `email`
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    /// Insert a new user. Fails with `AlreadyExists` when the email is taken.
    async fn create(&self, user: User) -> RepositoryResult<User>;

    /// Replace an existing user. Returns `None` when no user has that id and
    /// fails with `AlreadyExists` when the new email belongs to another user.
    async fn replace(&self, user: User) -> RepositoryResult<Option<User>>;

    /// Set only the role of user `id`, returning the updated user
    async fn set_role(&self, id: &str, role: Role) -> RepositoryResult<Option<User>>;

    /// Delete a user, returning the removed document
    async fn delete(&self, id: &str) -> RepositoryResult<Option<User>>;
}

/// DynamoDB implementation of the UserRepository trait
pub struct DynamoDbUserRepository {
    table: DynamoTable,
}

impl DynamoDbUserRepository {
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

    /// Convert a User struct to DynamoDB attribute values
    pub fn user_to_item(&self, user: &User) -> Item {
        let mut item = HashMap::new();

        item.insert("id".to_string(), AttributeValue::S(user.id.clone()));
        if let Some(name) = &user.name {
            item.insert("name".to_string(), AttributeValue::S(name.clone()));
        }
        item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
        item.insert(
            "photo_url".to_string(),
            AttributeValue::S(user.photo_url.clone()),
        );
        item.insert("role".to_string(), AttributeValue::S(user.role.to_string()));

        item
    }

    /// Convert DynamoDB item to User struct
    pub fn item_to_user(&self, item: Item) -> RepositoryResult<User> {
        let role = string_attr(&item, "role")?
            .parse::<Role>()
            .map_err(|e| RepositoryError::MalformedItem { message: e })?;

        Ok(User {
            id: string_attr(&item, "id")?,
            name: optional_string_attr(&item, "name"),
            email: string_attr(&item, "email")?,
            photo_url: string_attr(&item, "photo_url")?,
            role,
        })
    }

    fn claim_item(&self, user: &User) -> Item {
        HashMap::from([
            ("id".to_string(), AttributeValue::S(claim_key(&user.email))),
            ("user_id".to_string(), AttributeValue::S(user.id.clone())),
        ])
    }

    /// Put the user and its email claim, both only if their keys are free
    pub fn create_actions(&self, user: &User) -> RepositoryResult<Vec<TransactWriteItem>> {
        Ok(vec![
            self.table
                .put_action(self.user_to_item(user), "attribute_not_exists(id)")?,
            self.table
                .put_action(self.claim_item(user), "attribute_not_exists(id)")?,
        ])
    }

    /// Overwrite `current` with `replacement`. A changed email releases the
    /// old claim and takes the new one.
    pub fn replace_actions(
        &self,
        current: &User,
        replacement: &User,
    ) -> RepositoryResult<Vec<TransactWriteItem>> {
        let mut actions = vec![self
            .table
            .put_action(self.user_to_item(replacement), IS_USER)?];

        if current.email != replacement.email {
            actions.push(self.table.delete_action(&claim_key(&current.email), None)?);
            actions.push(
                self.table
                    .put_action(self.claim_item(replacement), "attribute_not_exists(id)")?,
            );
        }

        Ok(actions)
    }

    pub fn delete_actions(&self, current: &User) -> RepositoryResult<Vec<TransactWriteItem>> {
        Ok(vec![
            self.table.delete_action(&current.id, Some(IS_USER))?,
            self.table.delete_action(&claim_key(&current.email), None)?,
        ])
    }

    async fn find_user(&self, id: &str) -> RepositoryResult<Option<User>> {
        match self.table.fetch(id).await? {
            Some(item) if item.contains_key("email") => self.item_to_user(item).map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl UserRepository for DynamoDbUserRepository {
    #[instrument(skip(self), fields(table = %self.table.name()))]
    async fn find_all(&self) -> RepositoryResult<Vec<User>> {
        let items = self.table.scan_all(Some(IS_USER)).await?;
        let users = parse_items(items, "user", |item| self.item_to_user(item))?;
        info!("Found {} users", users.len());
        Ok(users)
    }

    #[instrument(skip(self), fields(table = %self.table.name(), user_id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        self.find_user(id).await
    }

    #[instrument(skip(self), fields(table = %self.table.name(), email = %email))]
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let user_id = match self.table.fetch(&claim_key(email)).await? {
            Some(claim) => string_attr(&claim, "user_id")?,
            None => return Ok(None),
        };

        let user = self.find_user(&user_id).await?;
        if user.is_none() {
            warn!(user_id = %user_id, "Email claim points at a missing user");
        }
        Ok(user)
    }

    #[instrument(skip(self, user), fields(table = %self.table.name(), user_id = %user.id))]
    async fn create(&self, user: User) -> RepositoryResult<User> {
        info!("Creating user");

        match self.table.transact(self.create_actions(&user)?).await {
            Ok(()) => Ok(user),
            Err(e) if is_condition_failure(&e) => Err(RepositoryError::AlreadyExists {
                key: claim_key(&user.email),
            }),
            Err(e) => Err(self.table.map_error(e)),
        }
    }

    #[instrument(skip(self, user), fields(table = %self.table.name(), user_id = %user.id))]
    async fn replace(&self, user: User) -> RepositoryResult<Option<User>> {
        let current = match self.find_user(&user.id).await? {
            Some(current) => current,
            None => return Ok(None),
        };

        match self.table.transact(self.replace_actions(&current, &user)?).await {
            Ok(()) => Ok(Some(user)),
            // Position 0 is the user row itself; any later one is the new claim
            Err(e) if failed_conditions(&e).contains(&0) => Ok(None),
            Err(e) if is_condition_failure(&e) => Err(RepositoryError::AlreadyExists {
                key: claim_key(&user.email),
            }),
            Err(e) => Err(self.table.map_error(e)),
        }
    }

    #[instrument(skip(self), fields(table = %self.table.name(), user_id = %id, role = %role))]
    async fn set_role(&self, id: &str, role: Role) -> RepositoryResult<Option<User>> {
        let result = self
            .table
            .call("UpdateItem", async {
                self.table
                    .client()
                    .update_item()
                    .table_name(self.table.name())
                    .key("id", AttributeValue::S(id.to_string()))
                    // `role` is a DynamoDB reserved word
                    .update_expression("SET #role = :role")
                    .condition_expression(IS_USER)
                    .expression_attribute_names("#role", "role")
                    .expression_attribute_values(":role", AttributeValue::S(role.to_string()))
                    .return_values(ReturnValue::AllNew)
                    .send()
                    .await
                    .map_err(DynamoDbError::from)
            })
            .await;

        match result {
            Ok(response) => response
                .attributes
                .map(|item| self.item_to_user(item))
                .transpose(),
            Err(e) if is_condition_failure(&e) => Ok(None),
            Err(e) => Err(self.table.map_error(e)),
        }
    }

    #[instrument(skip(self), fields(table = %self.table.name(), user_id = %id))]
    async fn delete(&self, id: &str) -> RepositoryResult<Option<User>> {
        let current = match self.find_user(id).await? {
            Some(current) => current,
            None => return Ok(None),
        };

        match self.table.transact(self.delete_actions(&current)?).await {
            Ok(()) => Ok(Some(current)),
            Err(e) if is_condition_failure(&e) => Ok(None),
            Err(e) => Err(self.table.map_error(e)),
        }
    }
}
