//! Prompt templates and rendering.

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::store::Lesson;

/// Tutor system-instruction template (`MiniJinja`).
pub const TUTOR_PROMPT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/tutor_prompt.md"
));

/// Pre-canned user text for the summary shortcut.
pub const SUMMARY_PROMPT: &str =
    "Please provide a concise but comprehensive summary of the key points for this lesson.";

/// Pre-canned user text for the flashcards shortcut.
pub const FLASHCARDS_PROMPT: &str =
    "Create a set of 5-10 study flashcards for this lesson. Format them clearly as 'Term: Definition'.";

/// Pre-canned user text for the quiz shortcut.
pub const QUIZ_PROMPT: &str =
    "Generate 3 practice questions to test my understanding of this lesson. List the questions first, then provide the answers at the end.";

#[derive(Serialize)]
struct TutorPromptVars<'a> {
    title: &'a str,
    subject: &'a str,
    description: &'a str,
}

/// Renders the tutor system instruction for a lesson.
pub fn render_tutor_prompt(lesson: &Lesson) -> Result<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_template("tutor_prompt", TUTOR_PROMPT_TEMPLATE)
        .context("Failed to load tutor prompt template")?;

    let output = env
        .get_template("tutor_prompt")
        .context("Failed to load tutor prompt template")?
        .render(TutorPromptVars {
            title: &lesson.title,
            subject: &lesson.subject,
            description: &lesson.description,
        })
        .context("Failed to render tutor prompt")?;

    Ok(output.trim().to_string())
}
