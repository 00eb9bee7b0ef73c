use anyhow::{Context, Result};
use tracing::info;

use lessonforge_core::{parse_metadata_reply, CurriculumMetadata};
use lessonforge_llm::{ChatClient, ChatRequest};

const EXTRACTOR_SYSTEM_PROMPT: &str = "You are an experienced educator who creates detailed, practical lesson plans. Return only valid JSON without any markdown formatting.";

/// Sends the full document text to the model with the fixed-schema prompt and
/// returns validated metadata. A reply that is not valid JSON, or that does
/// not match the declared shape, is a hard failure with no retry.
pub fn extract_metadata(
    client: &ChatClient,
    document_text: &str,
    grade: &str,
) -> Result<CurriculumMetadata> {
    let prompt = build_extraction_prompt(document_text, grade);
    let reply = client
        .chat_blocking(&ChatRequest {
            system: Some(EXTRACTOR_SYSTEM_PROMPT.to_string()),
            user: prompt,
        })
        .context("metadata extraction call failed")?;
    let metadata = parse_metadata_reply(&reply.content)?;
    info!(title = %metadata.title, "extracted curriculum metadata");
    Ok(metadata)
}

fn build_extraction_prompt(document_text: &str, grade: &str) -> String {
    format!(
        r#"You are an expert curriculum analyzer. Extract detailed information from the given curriculum document for class/grade "{grade}" and return it in the following JSON structure only:

{{
    "title": "Unit title",
    "duration": "Duration or 'Not specified'",
    "learningObjectives": [
        "List of learning objectives"
    ],
    "keyConcepts": [
        "List of key topics and concepts"
    ],
    "standards": [
        {{
            "code": "Standard code",
            "description": "Description of the standard"
        }}
    ],
    "assessments": [
        {{
            "type": "Type of assessment (e.g., Quiz, Project)",
            "criteria": "Assessment criteria"
        }}
    ],
    "materials": [
        {{
            "externalLinks": [
                "Array of external resource URLs"
            ],
            "description": "Description of resources"
        }}
    ],
    "tools": [
        "List of tools required"
    ]
}}

Instructions:
1. Extract ONLY information relevant to {grade}.
2. Return data in the exact JSON structure shown above.
3. Include all available information from the curriculum.
4. Use "Not specified" for any missing information.
5. Return ONLY the JSON object without any additional text or formatting.

Document text:
{document_text}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_interpolates_grade_and_document() {
        let prompt = build_extraction_prompt("Topic: Fractions. Grade 5.", "Grade 5");
        assert!(prompt.contains("class/grade \"Grade 5\""));
        assert!(prompt.contains("Topic: Fractions. Grade 5."));
        assert!(prompt.contains("\"learningObjectives\""));
    }

    #[test]
    fn local_provider_yields_valid_metadata() {
        let client = ChatClient::local();
        let metadata = extract_metadata(&client, "Topic: Fractions. Grade 5.", "Grade 5").unwrap();
        assert!(!metadata.title.is_empty());
        assert!(!metadata.learning_objectives.is_empty());
    }
}
