//! Lead import from a JSON file: an array of `NewLead` objects, or of
//! `{ "address": "...", "kind": "..." }` one-line address objects.

use std::path::PathBuf;

use async_trait::async_trait;
use leadflow_core::error::{LeadflowError, Result};
use leadflow_core::traits::LeadSource;
use leadflow_core::types::{Address, NewLead};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportedLead {
    Structured(NewLead),
    OneLine {
        address: String,
        #[serde(default)]
        kind: String,
        #[serde(default)]
        case_number: Option<String>,
    },
}

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse the whole document. Any bad entry fails the batch.
    pub fn parse(content: &str) -> Result<Vec<NewLead>> {
        let entries: Vec<ImportedLead> = serde_json::from_str(content)?;
        entries
            .into_iter()
            .map(|entry| match entry {
                ImportedLead::Structured(lead) => Ok(lead),
                ImportedLead::OneLine {
                    address,
                    kind,
                    case_number,
                } => Ok(NewLead {
                    target: Address::parse(&address)?,
                    contact: None,
                    kind,
                    case_number,
                    first_name: None,
                    last_name: None,
                }),
            })
            .collect()
    }
}

#[async_trait]
impl LeadSource for JsonFileSource {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn fetch(&self) -> Result<Vec<NewLead>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            LeadflowError::Source(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_entries() {
        let json = r#"[
            { "address": "12 oak ave, olathe, ks 66061", "kind": "CV", "case_number": "PM-1" },
            {
                "target": { "street": "1 Elm St", "city": "Olathe", "state": "KS", "zip": "66061" },
                "kind": "PR",
                "first_name": "Jo"
            }
        ]"#;
        let leads = JsonFileSource::parse(json).unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].target.street, "12 Oak Ave");
        assert_eq!(leads[0].case_number.as_deref(), Some("PM-1"));
        assert_eq!(leads[1].kind, "PR");
        assert_eq!(leads[1].first_name.as_deref(), Some("Jo"));
    }

    #[test]
    fn test_bad_address_fails_whole_batch() {
        let json = r#"[{ "address": "nowhere" }]"#;
        assert!(JsonFileSource::parse(json).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_source_error() {
        let source = JsonFileSource::new("/definitely/not/here.json");
        assert!(matches!(
            source.fetch().await,
            Err(LeadflowError::Source(_))
        ));
    }
}
