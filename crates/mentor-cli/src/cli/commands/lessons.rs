//! Lesson management (one-shot commands against the store).

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use mentor_core::config::paths;
use mentor_core::store::{Lesson, SessionStore};

pub fn list(search: Option<&str>, by_subject: bool) -> Result<()> {
    let store = SessionStore::load(paths::data_dir())?;
    if store.lessons().is_empty() {
        println!("No lessons. Create one with: mentor lessons new --title ... --subject ...");
        return Ok(());
    }

    let term = search.unwrap_or("");
    let lessons = store.search_lessons(term);
    if lessons.is_empty() {
        println!("No lessons match '{term}'");
        return Ok(());
    }

    if by_subject {
        // First-seen subject order, lessons most recent first within each
        let mut subjects: Vec<&str> = Vec::new();
        for lesson in &lessons {
            if !subjects.contains(&lesson.subject.as_str()) {
                subjects.push(&lesson.subject);
            }
        }
        for subject in subjects {
            println!("{subject}:");
            for lesson in lessons.iter().filter(|l| l.subject == subject) {
                println!(
                    "  {}  {}  {}",
                    lesson.id,
                    format_created(lesson.created_at),
                    lesson.title
                );
            }
        }
    } else {
        for lesson in &lessons {
            println!(
                "{}  {}  {} ({})",
                lesson.id,
                format_created(lesson.created_at),
                lesson.title,
                lesson.subject
            );
        }
    }
    Ok(())
}

pub fn new(title: String, subject: String, description: String) -> Result<()> {
    let mut store = SessionStore::load(paths::data_dir())?;
    let lesson = Lesson {
        id: uuid::Uuid::new_v4().to_string(),
        title,
        subject,
        description,
        created_at: Utc::now().timestamp_millis(),
    };
    let id = lesson.id.clone();
    let title = lesson.title.clone();
    store.create_lesson(lesson)?;
    tracing::info!(lesson_id = %id, "created lesson");
    println!("Created lesson {id} ({title})");
    Ok(())
}

pub fn delete(id: &str, yes: bool) -> Result<()> {
    let mut store = SessionStore::load(paths::data_dir())?;
    let Some(lesson) = store.lesson(id) else {
        bail!("No lesson with id {id}");
    };

    // Destructive-action gate: confirm before touching the store.
    if !yes && !confirm(&format!(
        "Delete lesson '{}' and its chat history? [y/N] ",
        lesson.title
    ))? {
        println!("Aborted");
        return Ok(());
    }

    store.delete_lesson(id)?;
    println!("Deleted lesson {id}");
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read input")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn format_created(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
