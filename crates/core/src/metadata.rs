use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Structured curriculum information extracted from one document. Field names
/// serialize in camelCase, matching the JSON shape the extraction prompt
/// declares to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumMetadata {
    pub title: String,
    pub duration: String,
    pub learning_objectives: Vec<String>,
    pub key_concepts: Vec<String>,
    pub standards: Vec<Standard>,
    pub assessments: Vec<Assessment>,
    pub materials: Vec<MaterialSet>,
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Standard {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    #[serde(rename = "type")]
    pub kind: String,
    pub criteria: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialSet {
    pub external_links: Vec<String>,
    pub description: String,
}

/// Parses a raw model reply into validated metadata. Code-fence markers are
/// stripped first; anything that then fails to parse as JSON, or parses into
/// a shape other than the declared one, is a hard failure.
pub fn parse_metadata_reply(reply: &str) -> Result<CurriculumMetadata> {
    let cleaned = strip_code_fences(reply);
    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|err| CoreError::MalformedReply(err.to_string()))?;
    validate_metadata(&value)
}

/// Checks a parsed value against the declared metadata shape and rejects it
/// with every missing or wrongly-typed field enumerated, rather than trusting
/// the model to have honored the schema.
pub fn validate_metadata(value: &Value) -> Result<CurriculumMetadata> {
    let mut issues = Vec::new();
    let object = match value.as_object() {
        Some(object) => object,
        None => {
            return Err(CoreError::InvalidMetadata {
                issues: vec!["reply is not a JSON object".to_string()],
            })
        }
    };

    for field in ["title", "duration"] {
        check_string(object.get(field), field, &mut issues);
    }
    for field in ["learningObjectives", "keyConcepts", "tools"] {
        check_string_array(object.get(field), field, &mut issues);
    }
    check_object_array(object.get("standards"), "standards", &mut issues, |item, path, issues| {
        check_string(item.get("code"), &format!("{path}.code"), issues);
        check_string(item.get("description"), &format!("{path}.description"), issues);
    });
    check_object_array(object.get("assessments"), "assessments", &mut issues, |item, path, issues| {
        check_string(item.get("type"), &format!("{path}.type"), issues);
        check_string(item.get("criteria"), &format!("{path}.criteria"), issues);
    });
    check_object_array(object.get("materials"), "materials", &mut issues, |item, path, issues| {
        check_string_array(
            item.get("externalLinks"),
            &format!("{path}.externalLinks"),
            issues,
        );
        check_string(item.get("description"), &format!("{path}.description"), issues);
    });

    if !issues.is_empty() {
        return Err(CoreError::InvalidMetadata { issues });
    }
    let metadata: CurriculumMetadata = serde_json::from_value(value.clone())?;
    Ok(metadata)
}

fn check_string(value: Option<&Value>, path: &str, issues: &mut Vec<String>) {
    match value {
        Some(Value::String(_)) => {}
        Some(_) => issues.push(format!("{path}: expected a string")),
        None => issues.push(format!("{path}: missing")),
    }
}

fn check_string_array(value: Option<&Value>, path: &str, issues: &mut Vec<String>) {
    match value {
        Some(Value::Array(items)) => {
            for (idx, item) in items.iter().enumerate() {
                if !item.is_string() {
                    issues.push(format!("{path}[{idx}]: expected a string"));
                }
            }
        }
        Some(_) => issues.push(format!("{path}: expected an array of strings")),
        None => issues.push(format!("{path}: missing")),
    }
}

fn check_object_array(
    value: Option<&Value>,
    path: &str,
    issues: &mut Vec<String>,
    mut check_item: impl FnMut(&serde_json::Map<String, Value>, &str, &mut Vec<String>),
) {
    match value {
        Some(Value::Array(items)) => {
            for (idx, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{idx}]");
                match item.as_object() {
                    Some(object) => check_item(object, &item_path, issues),
                    None => issues.push(format!("{item_path}: expected an object")),
                }
            }
        }
        Some(_) => issues.push(format!("{path}: expected an array")),
        None => issues.push(format!("{path}: missing")),
    }
}

/// Removes markdown code-fence markers some models wrap JSON replies in.
fn strip_code_fences(reply: &str) -> String {
    reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_value() -> Value {
        json!({
            "title": "Fractions Unit",
            "duration": "Not specified",
            "learningObjectives": ["Compare fractions"],
            "keyConcepts": ["Numerator", "Denominator"],
            "standards": [{"code": "5.NF.1", "description": "Add fractions"}],
            "assessments": [{"type": "Quiz", "criteria": "80% correct"}],
            "materials": [{"externalLinks": ["https://example.org"], "description": "Worksheets"}],
            "tools": ["Fraction tiles"]
        })
    }

    #[test]
    fn valid_reply_parses() {
        let metadata = parse_metadata_reply(&sample_value().to_string()).unwrap();
        assert_eq!(metadata.title, "Fractions Unit");
        assert_eq!(metadata.assessments[0].kind, "Quiz");
        assert_eq!(metadata.materials[0].external_links.len(), 1);
    }

    #[test]
    fn fenced_reply_parses() {
        let reply = format!("```json\n{}\n```", sample_value());
        assert!(parse_metadata_reply(&reply).is_ok());
    }

    #[test]
    fn non_json_reply_is_a_hard_failure() {
        let err = parse_metadata_reply("Sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(err, CoreError::MalformedReply(_)));
    }

    #[test]
    fn missing_and_invalid_fields_are_all_enumerated() {
        let mut value = sample_value();
        value.as_object_mut().unwrap().remove("title");
        value["duration"] = json!(42);
        value["standards"][0].as_object_mut().unwrap().remove("code");
        let err = validate_metadata(&value).unwrap_err();
        match err {
            CoreError::InvalidMetadata { issues } => {
                assert!(issues.iter().any(|i| i.starts_with("title:")));
                assert!(issues.iter().any(|i| i.starts_with("duration:")));
                assert!(issues.iter().any(|i| i.starts_with("standards[0].code:")));
                assert_eq!(issues.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_object_reply_is_rejected() {
        assert!(validate_metadata(&json!(["not", "an", "object"])).is_err());
    }
}
