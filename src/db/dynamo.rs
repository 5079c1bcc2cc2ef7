//! DynamoDB store.
//!
//! Implements the key-value seam on top of the AWS SDK. Supports both AWS
//! DynamoDB and DynamoDB Local for development.

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ProvisionedThroughput, ScalarAttributeType, TableStatus,
};
use serde_json::{Number, Value};
use tracing::{debug, info};

use super::{Item, KeyAttribute, KeyKind, KeyValueStore, TableCreation, TableSpec};
use crate::config::StoreSettings;
use crate::error::{AppError, AppResult};

/// Attempts made while waiting for a new table to become active.
const TABLE_ACTIVE_ATTEMPTS: u32 = 60;

/// Delay between table status checks.
const TABLE_ACTIVE_POLL: Duration = Duration::from_millis(500);

/// DynamoDB client wrapper.
#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    /// Create a new DynamoDB client from configuration.
    pub fn new(settings: &StoreSettings) -> Self {
        let credentials =
            Credentials::new(&settings.access_key, &settings.secret_key, None, None, "migrate");

        let mut builder = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);

        // Use custom endpoint for DynamoDB Local in development
        if let Some(ref endpoint) = settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(
            "DynamoDB store configured: region={}, endpoint={}",
            settings.region,
            settings.endpoint.as_deref().unwrap_or("<aws default>")
        );

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Poll until `table` reports ACTIVE.
    async fn wait_until_active(&self, table: &str) -> AppResult<()> {
        for _ in 0..TABLE_ACTIVE_ATTEMPTS {
            let output = self
                .client
                .describe_table()
                .table_name(table)
                .send()
                .await
                .map_err(|e| sdk_error("DescribeTable", e))?;

            let status = output.table().and_then(|t| t.table_status());
            if status == Some(&TableStatus::Active) {
                return Ok(());
            }

            debug!("Waiting for table {} to become active ({:?})", table, status);
            tokio::time::sleep(TABLE_ACTIVE_POLL).await;
        }

        Err(AppError::Store(format!(
            "Table {} did not become active in time",
            table
        )))
    }
}

/// Map an SDK failure to an application error.
///
/// Dispatch and timeout failures mean the service was never reached.
fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> AppError
where
    E: std::error::Error + 'static,
    R: Debug,
{
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => AppError::StoreUnavailable(
            format!("{} could not reach DynamoDB: {}", operation, DisplayErrorContext(&err)),
        ),
        _ => AppError::Store(format!("{} failed: {}", operation, DisplayErrorContext(&err))),
    }
}

fn scalar_type(kind: KeyKind) -> ScalarAttributeType {
    match kind {
        KeyKind::Number => ScalarAttributeType::N,
        KeyKind::String => ScalarAttributeType::S,
    }
}

fn build_error(err: impl std::fmt::Display) -> AppError {
    AppError::Store(format!("Invalid table definition: {}", err))
}

fn key_definition(
    key: &KeyAttribute,
    key_type: KeyType,
) -> AppResult<(AttributeDefinition, KeySchemaElement)> {
    let definition = AttributeDefinition::builder()
        .attribute_name(&key.name)
        .attribute_type(scalar_type(key.kind))
        .build()
        .map_err(build_error)?;
    let schema = KeySchemaElement::builder()
        .attribute_name(&key.name)
        .key_type(key_type)
        .build()
        .map_err(build_error)?;
    Ok((definition, schema))
}

/// Convert a JSON value to a DynamoDB attribute.
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(name, value)| (name.clone(), to_attribute(value)))
                .collect(),
        ),
    }
}

/// Convert a DynamoDB attribute back to JSON.
///
/// Binary attributes have no JSON form and are rejected.
pub fn from_attribute(attribute: &AttributeValue) -> AppResult<Value> {
    let value = match attribute {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => Value::Number(parse_number(n)?),
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(from_attribute)
                .collect::<AppResult<Vec<_>>>()?,
        ),
        AttributeValue::M(map) => Value::Object(from_attribute_map(map)?),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<AppResult<Vec<_>>>()?,
        ),
        other => {
            return Err(AppError::Store(format!(
                "Unsupported attribute type: {:?}",
                other
            )));
        }
    };
    Ok(value)
}

fn parse_number(raw: &str) -> AppResult<Number> {
    Ok(serde_json::from_str::<Number>(raw)?)
}

fn to_attribute_map(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute(value)))
        .collect()
}

fn from_attribute_map(map: &HashMap<String, AttributeValue>) -> AppResult<Item> {
    map.iter()
        .map(|(name, attribute)| Ok((name.clone(), from_attribute(attribute)?)))
        .collect()
}

#[async_trait::async_trait]
impl KeyValueStore for DynamoStore {
    async fn create_table(&self, spec: &TableSpec) -> AppResult<TableCreation> {
        let (partition_def, partition_schema) = key_definition(&spec.partition_key, KeyType::Hash)?;
        let mut request = self
            .client
            .create_table()
            .table_name(&spec.name)
            .attribute_definitions(partition_def)
            .key_schema(partition_schema);

        if let Some(ref sort_key) = spec.sort_key {
            let (sort_def, sort_schema) = key_definition(sort_key, KeyType::Range)?;
            request = request
                .attribute_definitions(sort_def)
                .key_schema(sort_schema);
        }

        request = match spec.throughput {
            Some(throughput) => request.provisioned_throughput(
                ProvisionedThroughput::builder()
                    .read_capacity_units(throughput.read)
                    .write_capacity_units(throughput.write)
                    .build()
                    .map_err(build_error)?,
            ),
            None => request.billing_mode(BillingMode::PayPerRequest),
        };

        match request.send().await {
            Ok(_) => {
                info!("Creating DynamoDB table '{}'", spec.name);
                self.wait_until_active(&spec.name).await?;
                info!("DynamoDB table '{}' created", spec.name);
                Ok(TableCreation::Created)
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|service| service.is_resource_in_use_exception()) =>
            {
                debug!("DynamoDB table '{}' already exists", spec.name);
                Ok(TableCreation::AlreadyExists)
            }
            Err(e) => Err(sdk_error("CreateTable", e)),
        }
    }

    async fn table_exists(&self, table: &str) -> AppResult<bool> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(_) => Ok(true),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|service| service.is_resource_not_found_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(sdk_error("DescribeTable", e)),
        }
    }

    async fn delete_table(&self, table: &str) -> AppResult<()> {
        self.client
            .delete_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteTable", e))?;
        info!("DynamoDB table '{}' deleted", table);
        Ok(())
    }

    async fn get_item(&self, table: &str, key: &Item) -> AppResult<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(to_attribute_map(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| sdk_error("GetItem", e))?;

        output.item().map(from_attribute_map).transpose()
    }

    async fn put_item(&self, table: &str, item: Item) -> AppResult<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_attribute_map(&item)))
            .send()
            .await
            .map_err(|e| sdk_error("PutItem", e))?;
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &Item) -> AppResult<()> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(to_attribute_map(key)))
            .send()
            .await
            .map_err(|e| sdk_error("DeleteItem", e))?;
        Ok(())
    }

    async fn scan(&self, table: &str) -> AppResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(table)
                .consistent_read(true)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| sdk_error("Scan", e))?;

            for item in output.items() {
                items.push(from_attribute_map(item)?);
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }
}
