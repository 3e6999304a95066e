use std::collections::HashMap;

use anyhow::{anyhow, Context};
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::{
    config::{Builder as DynamoConfigBuilder, Region},
    types::AttributeValue,
    Client,
};

use crate::config::AwsConfig;

pub type Item = HashMap<String, AttributeValue>;

/// Builds the DynamoDB client once at startup. A localhost endpoint
/// (DynamoDB Local) gets static throwaway credentials.
pub async fn connect(aws: &AwsConfig) -> anyhow::Result<Client> {
    let mut loader = defaults(BehaviorVersion::latest()).region(Region::new(aws.region.clone()));

    if let Some(endpoint) = &aws.dynamodb_endpoint {
        loader = loader.endpoint_url(endpoint);
        if endpoint.contains("localhost") || endpoint.contains("127.0.0.1") {
            loader = loader.credentials_provider(Credentials::new(
                "local", "local", None, None, "static",
            ));
        }
    }

    let shared = loader.load().await;
    let conf = DynamoConfigBuilder::from(&shared).build();
    tracing::info!(region = %aws.region, endpoint = ?aws.dynamodb_endpoint, "dynamodb client ready");
    Ok(Client::from_conf(conf))
}

pub fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

pub fn n(value: u64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

pub fn string_list(values: &[String]) -> AttributeValue {
    AttributeValue::L(values.iter().cloned().map(AttributeValue::S).collect())
}

pub fn get_s(item: &Item, attr: &str) -> anyhow::Result<String> {
    get_opt_s(item, attr)?.ok_or_else(|| anyhow!("attribute {attr} missing"))
}

pub fn get_opt_s(item: &Item, attr: &str) -> anyhow::Result<Option<String>> {
    match item.get(attr) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::S(v)) => Ok(Some(v.clone())),
        Some(_) => Err(anyhow!("attribute {attr} is not a string")),
    }
}

/// Missing numbers read as zero.
pub fn get_n_or_zero(item: &Item, attr: &str) -> anyhow::Result<u64> {
    match item.get(attr) {
        None | Some(AttributeValue::Null(_)) => Ok(0),
        Some(AttributeValue::N(v)) => v
            .parse::<u64>()
            .with_context(|| format!("attribute {attr} is not a non-negative integer")),
        Some(_) => Err(anyhow!("attribute {attr} is not a number")),
    }
}

/// Accepts both list-of-strings and string-set encodings; sets lose order.
pub fn get_string_list(item: &Item, attr: &str) -> anyhow::Result<Vec<String>> {
    match item.get(attr) {
        None | Some(AttributeValue::Null(_)) => Ok(Vec::new()),
        Some(AttributeValue::Ss(values)) => Ok(values.clone()),
        Some(AttributeValue::L(values)) => values
            .iter()
            .map(|v| match v {
                AttributeValue::S(s) => Ok(s.clone()),
                _ => Err(anyhow!("attribute {attr} contains a non-string element")),
            })
            .collect(),
        Some(_) => Err(anyhow!("attribute {attr} is not a list")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_number_reads_as_zero() {
        let item = Item::new();
        assert_eq!(get_n_or_zero(&item, "views").unwrap(), 0);
    }

    #[test]
    fn list_keeps_order() {
        let mut item = Item::new();
        let tags = vec!["rust".to_string(), "aws".to_string(), "blog".to_string()];
        item.insert("tags".into(), string_list(&tags));
        assert_eq!(get_string_list(&item, "tags").unwrap(), tags);
    }

    #[test]
    fn wrong_type_is_an_error() {
        let mut item = Item::new();
        item.insert("title".into(), n(3));
        assert!(get_s(&item, "title").is_err());
        assert!(get_s(&item, "absent").is_err());
    }
}
