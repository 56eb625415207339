use aws_sdk_dynamodb::operation::get_item::builders::GetItemFluentBuilder;
use aws_sdk_dynamodb::types::{
    AttributeValue, Delete, DeleteRequest, KeysAndAttributes, Put, TransactWriteItem, Update,
    WriteRequest,
};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, warn, Instrument};

use crate::models::{RepositoryError, RepositoryResult};
use crate::observability::Metrics;

pub type Item = HashMap<String, AttributeValue>;

/// BatchWriteItem accepts at most 25 requests per call
pub const BATCH_WRITE_LIMIT: usize = 25;
/// BatchGetItem accepts at most 100 keys per call
pub const BATCH_GET_LIMIT: usize = 100;
pub const MAX_BATCH_ATTEMPTS: u32 = 3;
/// Delay before the first retry of unprocessed batch requests; doubles per attempt
pub const BATCH_BACKOFF: Duration = Duration::from_millis(50);

/// Handle on a single DynamoDB table shared by the repositories
#[derive(Clone)]
pub struct DynamoTable {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
    metrics: Option<Arc<Metrics>>,
}

impl DynamoTable {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
            metrics: None,
        }
    }

    /// Record `database_operations_total` and latency for every call
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn client(&self) -> &DynamoDbClient {
        &self.client
    }

    pub fn name(&self) -> &str {
        &self.table_name
    }

    /// Create a DynamoDB client span with database semantic-convention attributes
    fn span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "DynamoDB",
            "aws.service" = "DynamoDB",
            "aws.operation" = operation,
            "aws.region" = %self.region,
            "aws.dynamodb.table_name" = %self.table_name,
            "aws.remote.service" = "AWS::DynamoDB",
            "aws.remote.operation" = operation,
            "aws.remote.resource.type" = "AWS::DynamoDB::Table",
            "aws.remote.resource.identifier" = %self.table_name,
            "otel.kind" = "client",
            "otel.name" = format!("DynamoDB.{}", operation),
            "rpc.system" = "aws-api",
            "rpc.service" = "AmazonDynamoDBv2",
            "rpc.method" = operation,
            "db.system" = "dynamodb",
            "db.name" = %self.table_name,
            "db.operation" = operation,
            "component" = "aws-sdk-dynamodb",
        )
    }

    /// Run one SDK call inside its client span and record its outcome
    pub async fn call<F, T>(&self, operation: &str, request: F) -> Result<T, DynamoDbError>
    where
        F: Future<Output = Result<T, DynamoDbError>>,
    {
        let started = Instant::now();
        let result = request.instrument(self.span(operation)).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_database_operation(
                operation,
                &self.table_name,
                result.is_ok(),
                started.elapsed().as_secs_f64(),
            );
        }

        result
    }

    fn key(id: &str) -> Item {
        HashMap::from([("id".to_string(), AttributeValue::S(id.to_string()))])
    }

    /// Strongly consistent GetItem by `id`
    pub fn get_item(&self, id: &str) -> GetItemFluentBuilder {
        self.client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(id)))
            .consistent_read(true)
    }

    pub async fn fetch(&self, id: &str) -> RepositoryResult<Option<Item>> {
        let response = self
            .call("GetItem", async {
                self.get_item(id).send().await.map_err(DynamoDbError::from)
            })
            .await
            .map_err(|e| self.map_error(e))?;

        Ok(response.item)
    }

    /// Paginated Scan, optionally narrowed by a filter expression
    pub async fn scan_all(&self, filter: Option<&str>) -> RepositoryResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let response = self
                .call("Scan", async {
                    self.client
                        .scan()
                        .table_name(&self.table_name)
                        .set_filter_expression(filter.map(str::to_string))
                        .set_exclusive_start_key(start_key.clone())
                        .send()
                        .await
                        .map_err(DynamoDbError::from)
                })
                .await
                .map_err(|e| self.map_error(e))?;

            items.extend(response.items.unwrap_or_default());
            start_key = response.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        Ok(items)
    }

    pub fn put_action(&self, item: Item, condition: &str) -> RepositoryResult<TransactWriteItem> {
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression(condition)
            .build()
            .map_err(|e| build_error("transaction put", e))?;

        Ok(TransactWriteItem::builder().put(put).build())
    }

    pub fn delete_action(
        &self,
        id: &str,
        condition: Option<&str>,
    ) -> RepositoryResult<TransactWriteItem> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(id)))
            .set_condition_expression(condition.map(str::to_string))
            .build()
            .map_err(|e| build_error("transaction delete", e))?;

        Ok(TransactWriteItem::builder().delete(delete).build())
    }

    pub fn update_action(
        &self,
        id: &str,
        expression: &str,
        values: Item,
    ) -> RepositoryResult<TransactWriteItem> {
        let update = Update::builder()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(id)))
            .update_expression(expression)
            .set_expression_attribute_values(Some(values))
            .build()
            .map_err(|e| build_error("transaction update", e))?;

        Ok(TransactWriteItem::builder().update(update).build())
    }

    /// Apply `actions` atomically. Callers inspect the raw error with
    /// [`failed_conditions`] to tell which condition did not hold.
    pub async fn transact(&self, actions: Vec<TransactWriteItem>) -> Result<(), DynamoDbError> {
        self.call("TransactWriteItems", async {
            self.client
                .transact_write_items()
                .set_transact_items(Some(actions))
                .send()
                .await
                .map_err(DynamoDbError::from)
        })
        .await
        .map(|_| ())
    }

    /// Strongly consistent BatchGetItem over `ids`. Ids with no stored item are skipped.
    pub async fn batch_get(&self, ids: &[String]) -> RepositoryResult<Vec<Item>> {
        let mut items = Vec::new();

        for chunk in ids.chunks(BATCH_GET_LIMIT) {
            let keys: Vec<Item> = chunk.iter().map(|id| Self::key(id)).collect();
            items.extend(
                drain_batch("BatchGetItem", keys, BATCH_BACKOFF, |keys| self.get_batch(keys)).await?,
            );
        }

        Ok(items)
    }

    async fn get_batch(&self, keys: Vec<Item>) -> RepositoryResult<(Vec<Item>, Vec<Item>)> {
        let request = KeysAndAttributes::builder()
            .set_keys(Some(keys))
            .consistent_read(true)
            .build()
            .map_err(|e| build_error("batch get", e))?;

        let response = self
            .call("BatchGetItem", async {
                self.client
                    .batch_get_item()
                    .request_items(&self.table_name, request)
                    .send()
                    .await
                    .map_err(DynamoDbError::from)
            })
            .await
            .map_err(|e| self.map_error(e))?;

        let found = response
            .responses
            .and_then(|mut responses| responses.remove(&self.table_name))
            .unwrap_or_default();
        let unprocessed = response
            .unprocessed_keys
            .and_then(|mut unprocessed| unprocessed.remove(&self.table_name))
            .map(|pending| pending.keys().to_vec())
            .unwrap_or_default();

        Ok((found, unprocessed))
    }

    /// Delete every id with BatchWriteItem. Fails when DynamoDB still reports
    /// unprocessed deletions after the retries.
    pub async fn batch_delete(&self, ids: &[String]) -> RepositoryResult<u64> {
        for chunk in ids.chunks(BATCH_WRITE_LIMIT) {
            let requests = chunk
                .iter()
                .map(|id| {
                    let delete = DeleteRequest::builder()
                        .set_key(Some(Self::key(id)))
                        .build()
                        .map_err(|e| build_error("delete request", e))?;
                    Ok(WriteRequest::builder().delete_request(delete).build())
                })
                .collect::<RepositoryResult<Vec<_>>>()?;

            drain_batch("BatchWriteItem", requests, BATCH_BACKOFF, |requests| {
                self.write_batch(requests)
            })
            .await?;
        }

        Ok(ids.len() as u64)
    }

    async fn write_batch(
        &self,
        requests: Vec<WriteRequest>,
    ) -> RepositoryResult<(Vec<()>, Vec<WriteRequest>)> {
        let response = self
            .call("BatchWriteItem", async {
                self.client
                    .batch_write_item()
                    .request_items(&self.table_name, requests)
                    .send()
                    .await
                    .map_err(DynamoDbError::from)
            })
            .await
            .map_err(|e| self.map_error(e))?;

        let unprocessed = response
            .unprocessed_items
            .and_then(|mut unprocessed| unprocessed.remove(&self.table_name))
            .unwrap_or_default();

        Ok((Vec::new(), unprocessed))
    }

    /// Convert DynamoDB error to RepositoryError
    pub fn map_error(&self, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error: {:?}", error);

        if let DynamoDbError::ResourceNotFoundException(_) = error {
            return RepositoryError::TableNotFound {
                table_name: self.table_name.clone(),
            };
        }

        RepositoryError::AwsSdk {
            message: error.to_string(),
        }
    }
}

pub fn build_error(what: &str, e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::AwsSdk {
        message: format!("Failed to build {}: {}", what, e),
    }
}

/// Positions of the transaction actions whose condition did not hold
pub fn failed_conditions(error: &DynamoDbError) -> Vec<usize> {
    match error {
        DynamoDbError::TransactionCanceledException(cancelled) => cancelled
            .cancellation_reasons()
            .iter()
            .enumerate()
            .filter(|(_, reason)| reason.code() == Some("ConditionalCheckFailed"))
            .map(|(position, _)| position)
            .collect(),
        _ => Vec::new(),
    }
}

/// True when a conditional write was rejected because its condition did not hold
pub fn is_condition_failure(error: &DynamoDbError) -> bool {
    matches!(error, DynamoDbError::ConditionalCheckFailedException(_))
        || !failed_conditions(error).is_empty()
}

/// Send `pending` through `send` until nothing comes back unprocessed,
/// sleeping `base_delay`, then twice that, between attempts.
/// `send` returns what it produced and what DynamoDB left unprocessed.
pub async fn drain_batch<R, O, F, Fut>(
    operation: &str,
    mut pending: Vec<R>,
    base_delay: Duration,
    mut send: F,
) -> RepositoryResult<Vec<O>>
where
    F: FnMut(Vec<R>) -> Fut,
    Fut: Future<Output = RepositoryResult<(Vec<O>, Vec<R>)>>,
{
    let mut produced = Vec::new();

    for attempt in 0..MAX_BATCH_ATTEMPTS {
        if attempt > 0 {
            let delay = base_delay * 2u32.pow(attempt - 1);
            warn!(
                "{} left {} requests unprocessed, retrying in {:?}",
                operation,
                pending.len(),
                delay
            );
            tokio::time::sleep(delay).await;
        }

        let (output, unprocessed) = send(pending).await?;
        produced.extend(output);
        pending = unprocessed;

        if pending.is_empty() {
            return Ok(produced);
        }
    }

    error!("{} gave up with {} requests unprocessed", operation, pending.len());
    Err(RepositoryError::Unprocessed {
        operation: operation.to_string(),
        remaining: pending.len(),
    })
}

pub fn string_attr(item: &Item, key: &str) -> RepositoryResult<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| RepositoryError::MalformedItem {
            message: format!("Missing {}", key),
        })
}

pub fn optional_string_attr(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).cloned()
}

/// Members of a string-set attribute; an absent set reads as empty
pub fn string_set_attr(item: &Item, key: &str) -> Vec<String> {
    item.get(key)
        .and_then(|v| v.as_ss().ok())
        .cloned()
        .unwrap_or_default()
}

pub fn decimal_attr(item: &Item, key: &str) -> RepositoryResult<Decimal> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| Decimal::from_str(s).ok())
        .ok_or_else(|| RepositoryError::MalformedItem {
            message: format!("Invalid {}", key),
        })
}

pub fn u32_attr(item: &Item, key: &str) -> RepositoryResult<u32> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RepositoryError::MalformedItem {
            message: format!("Invalid {}", key),
        })
}

/// Parse every item with `parse`. The first row that fails aborts the read.
pub fn parse_items<T, F>(items: Vec<Item>, kind: &str, parse: F) -> RepositoryResult<Vec<T>>
where
    F: Fn(Item) -> RepositoryResult<T>,
{
    items
        .into_iter()
        .map(|item| {
            parse(item).map_err(|e| {
                error!("Failed to parse {} item: {}", kind, e);
                e
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn test_client() -> Arc<DynamoDbClient> {
    let config = aws_sdk_dynamodb::Config::builder()
        .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
        .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
        .build();
    Arc::new(DynamoDbClient::from_conf(config))
}
