//! Form-like field deserialization

use serde::{Deserialize, Deserializer};

/// Accept a JSON string, an integer or null for a text field; null becomes blank
pub fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => n.to_string(),
        Some(Raw::Text(t)) => t,
        None => String::new(),
    })
}
