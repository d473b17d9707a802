use std::env;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LookupIndexConfig {
    /// JSON array of `{id, tag, object_ref}` objects on local disk.
    File {
        #[serde(default = "default_records_path")]
        path: String,
    },
    Dynamodb(DynamoIndexConfig),
}

impl Default for LookupIndexConfig {
    fn default() -> Self {
        LookupIndexConfig::File {
            path: default_records_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DynamoIndexConfig {
    pub table_name: String,
    /// Global secondary index keyed on the tag attribute.
    pub tag_index: String,
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    #[serde(default = "default_tag_attribute")]
    pub tag_attribute: String,
    #[serde(default = "default_object_ref_attribute")]
    pub object_ref_attribute: String,
    #[serde(default)]
    pub region: Option<String>,
}

fn default_id_attribute() -> String {
    "id".to_string()
}

fn default_tag_attribute() -> String {
    "tag".to_string()
}

fn default_object_ref_attribute() -> String {
    "uri".to_string()
}

pub fn default_records_path() -> String {
    env::current_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
        .join("bundler_storage/records.json")
        .to_str()
        .unwrap_or("./bundler_storage/records.json")
        .to_string()
}
