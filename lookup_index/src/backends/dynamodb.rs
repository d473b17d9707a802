//! DynamoDB lookup table queried through a global secondary index on the tag.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{config::Region, types::AttributeValue, Client};
use data_model::LookupRecord;
use tracing::debug;

use crate::{DynamoIndexConfig, LookupError, LookupIndex, LookupResult};

pub struct DynamoLookupIndex {
    client: Client,
    config: DynamoIndexConfig,
}

impl DynamoLookupIndex {
    pub async fn new(config: DynamoIndexConfig) -> Self {
        let mut config_loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(r) = config.region.clone() {
            config_loader = config_loader.region(Region::new(r));
        }
        let aws_config = config_loader.load().await;
        debug!(
            table = %config.table_name,
            index = %config.tag_index,
            "Created DynamoDB lookup index"
        );
        Self {
            client: Client::new(&aws_config),
            config,
        }
    }

    fn string_attribute(
        item: &HashMap<String, AttributeValue>,
        name: &str,
    ) -> LookupResult<String> {
        match item.get(name) {
            Some(AttributeValue::S(value)) => Ok(value.clone()),
            Some(AttributeValue::N(value)) => Ok(value.clone()),
            Some(_) => Err(LookupError::MalformedRecord {
                reason: format!("attribute {} is not a string", name),
            }),
            None => Err(LookupError::MalformedRecord {
                reason: format!("missing attribute {}", name),
            }),
        }
    }

    fn record_from_item(&self, item: &HashMap<String, AttributeValue>) -> LookupResult<LookupRecord> {
        Ok(LookupRecord {
            id: Self::string_attribute(item, &self.config.id_attribute)?,
            tag: Self::string_attribute(item, &self.config.tag_attribute)?,
            object_ref: Self::string_attribute(item, &self.config.object_ref_attribute)?,
        })
    }
}

#[async_trait]
impl LookupIndex for DynamoLookupIndex {
    async fn query_by_tag(&self, tag: &str) -> LookupResult<Vec<LookupRecord>> {
        // An empty string can't be a key value in DynamoDB; nothing can match.
        if tag.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let output = self
                .client
                .query()
                .table_name(&self.config.table_name)
                .index_name(&self.config.tag_index)
                .key_condition_expression("#tag = :tag")
                .expression_attribute_names("#tag", &self.config.tag_attribute)
                .expression_attribute_values(":tag", AttributeValue::S(tag.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| LookupError::unavailable(e.into_service_error()))?;

            for item in output.items() {
                records.push(self.record_from_item(item)?);
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!(tag, count = records.len(), "queried dynamodb lookup index");
        Ok(records)
    }

    async fn get_by_id(&self, id: &str) -> LookupResult<Option<LookupRecord>> {
        if id.is_empty() {
            return Ok(None);
        }

        let output = self
            .client
            .get_item()
            .table_name(&self.config.table_name)
            .key(&self.config.id_attribute, AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|e| LookupError::unavailable(e.into_service_error()))?;

        output
            .item()
            .map(|item| self.record_from_item(item))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pairs: &[(&str, AttributeValue)]) -> HashMap<String, AttributeValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_string_attribute() {
        let row = item(&[
            ("id", AttributeValue::N("7".to_string())),
            ("uri", AttributeValue::S("files/a.pdf".to_string())),
            ("flag", AttributeValue::Bool(true)),
        ]);

        assert_eq!(DynamoLookupIndex::string_attribute(&row, "id").unwrap(), "7");
        assert_eq!(
            DynamoLookupIndex::string_attribute(&row, "uri").unwrap(),
            "files/a.pdf"
        );
        assert!(matches!(
            DynamoLookupIndex::string_attribute(&row, "flag"),
            Err(LookupError::MalformedRecord { .. })
        ));
        assert!(matches!(
            DynamoLookupIndex::string_attribute(&row, "tag"),
            Err(LookupError::MalformedRecord { .. })
        ));
    }
}
