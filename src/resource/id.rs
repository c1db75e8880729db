//! Composite resource IDs
//!
//! Child resources are addressed by joining their ancestors' names with `:`,
//! e.g. `project:topic` or `project:topic:sub_id`.

use super::error::{ProviderError, Result};

pub const COLON_SEPARATED: &str = ":";

/// Join ID parts with the separator
pub fn compose_id<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(COLON_SEPARATED)
}

/// Split an ID into exactly `fields.len()` parts
///
/// A mismatch cannot be fixed by retrying: the operator has to re-import the
/// resource using its explicit fields, which the error message names.
pub fn parse_id(id: &str, type_name: &str, fields: &[&str]) -> Result<Vec<String>> {
    let parts: Vec<String> = id.split(COLON_SEPARATED).map(str::to_string).collect();

    if parts.len() != fields.len() || parts.iter().any(String::is_empty) {
        let quoted = fields
            .iter()
            .map(|f| format!("'{}'", f))
            .collect::<Vec<_>>()
            .join(" and ");
        return Err(ProviderError::InvalidId {
            id: id.to_string(),
            message: format!(
                "you should use resource {}'s fields {} to re-import this resource",
                type_name, quoted
            ),
        });
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose() {
        assert_eq!(compose_id(&["p", "t"]), "p:t");
        assert_eq!(compose_id(&["p", "t", "s"]), "p:t:s");
        assert_eq!(compose_id(&["p"]), "p");
    }

    #[test]
    fn test_parse_matches_count() {
        let parts = parse_id("p:t", "alicloud_datahub_topic", &["project_name", "topic_name"])
            .unwrap();
        assert_eq!(parts, vec!["p", "t"]);
    }

    #[test]
    fn test_parse_wrong_count_names_fields() {
        let err = parse_id("only", "alicloud_datahub_topic", &["project_name", "topic_name"])
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ProviderError::InvalidId { .. }));
        assert!(msg.contains("'project_name' and 'topic_name'"));
        assert!(msg.contains("re-import"));

        assert!(parse_id("a:b:c", "alicloud_datahub_topic", &["project_name", "topic_name"]).is_err());
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert!(parse_id("p:", "alicloud_datahub_topic", &["project_name", "topic_name"]).is_err());
        assert!(parse_id("", "alicloud_datahub_project", &["name"]).is_err());
    }
}
