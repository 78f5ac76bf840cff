use anyhow::{Context, Result};
use serde::Serialize;

pub struct YamlFormatter;

impl YamlFormatter {
    pub fn format<T: Serialize + ?Sized>(value: &T) -> Result<String> {
        serde_yaml::to_string(value).context("Failed to serialize output as YAML")
    }
}
