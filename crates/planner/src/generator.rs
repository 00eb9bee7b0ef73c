use anyhow::{Context, Result};
use tracing::info;

use lessonforge_llm::{ChatClient, ChatRequest};
use lessonforge_rag::{retrieve_context, EmbeddingClient, VectorIndex};

use crate::config::PLAN_CONTEXT_TOP_K;

const GENERATOR_SYSTEM_PROMPT: &str =
    "You are an experienced educator who creates detailed, practical lesson plans.";

/// Retrieves the top-k chunks for the topic query and asks the model for a
/// multi-day plan. The reply is returned untouched; no section or markdown
/// validation happens here.
pub fn generate_lesson_plan(
    client: &ChatClient,
    index: &VectorIndex,
    embeddings: &EmbeddingClient,
    collection: &str,
    grade: &str,
    topic: &str,
    days: u32,
) -> Result<String> {
    let query = format!("Information about topic '{topic}' and subtopic for {grade} grade");
    let retrieved = retrieve_context(index, embeddings, collection, &query, PLAN_CONTEXT_TOP_K)
        .context("context retrieval failed")?;
    info!(
        chunks = retrieved.chunks.len(),
        collection, "retrieved plan context"
    );
    let prompt = build_plan_prompt(grade, topic, days, &retrieved.text);
    let reply = client
        .chat_blocking(&ChatRequest {
            system: Some(GENERATOR_SYSTEM_PROMPT.to_string()),
            user: prompt,
        })
        .context("lesson plan generation call failed")?;
    Ok(reply.content)
}

fn build_plan_prompt(grade: &str, topic: &str, days: u32, context_text: &str) -> String {
    format!(
        r#"Create a comprehensive, detailed, and practical {days}-day lesson plan for a {grade} class on the topic '{topic}' with a focus on the subtopic from the unit. The course should be designed for a 50-minute class period each day, totaling minutes over {days} day(s).

Use the following context to inform your lesson plan:
{context_text}

Please structure the lesson plan with the following sections:

**1. Purpose**
- Explain the main focus of the lesson and its relationship to the curriculum.
- Outline relevant content standards and performance standards.
- Describe how this connects to real-world applications.

**2. Objectives**
- List 3-4 specific, measurable learning objectives starting with "By the end of this lesson, students will be able to:"
- Ensure objectives align with the content standards.
- Include both knowledge and skill-based objectives.

**3. Planning and Preparation Notes**
- Materials and Resources needed.
- Classroom Setup requirements.
- Lesson Timing breakdown:
  - Introduction:
  - Mini Lesson:
  - Guided Practice:
  - Independent Practice:
  - Assessment:
- Anticipated Challenges and solutions.
- Differentiation strategies for various learning levels.

**4. Prior Knowledge**
- What Students Should Already Know.
- How to Evaluate Prior Knowledge.
- Teaching at The Right Level strategies.
- Approaches for different student levels (struggling, comfortable, advanced).

**5. Lesson Flow**
Provide a detailed breakdown for each day of the lesson plan. For every day, include the following segments:

- **Introduction:**
  - Hook and engagement strategy.
- **Mini-Lesson:**
  - Core concept presentation.
- **Guided Practice:**
  - Group activities and teacher support.
- **Syllabus Breakdown (Daily):**
  - Present a detailed syllabus for the day that covers all relevant topics and subtopics, with emphasis on the subtopic.
  - Include specific subtopic details such as definitions, examples, historical context, real-world applications, prerequisites, and interconnections between topics.
  - Ensure the daily syllabus connects with the overall curriculum structure and suggests recommended supplemental resources.
- **Independent Practice:**
  - Individual tasks.
- **Assessment and Wrap-Up:**
  - Checking understanding and closure.

**6. Extension/Enrichment**
- Additional activities for advanced learners.
- Alternative approaches for deeper understanding.
- Creative projects or applications.
- Take-home activities.

**7. Assessment Tools**
- Diagnostic Assessments (pre-lesson evaluation).
- Formative Assessments (during-lesson checks).
- Summative Assessments (post-lesson evaluation).
- Assessment notes for teachers.
- Differentiation strategies for assessment.
- Feedback mechanisms.

Ensure the plan is practical, thorough, and includes clear instructions for implementation. Use specific examples and provide detailed guidance for teachers to effectively deliver the lesson.
"#
    )
}
