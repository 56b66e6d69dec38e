//! Interactive tutoring chat (REPL).

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use mentor_core::config::{Config, paths};
use mentor_core::controller::{SessionController, Shortcut};
use mentor_core::provider::StreamingBackend;
use mentor_core::provider::gemini::{GeminiClient, GeminiConfig};
use mentor_core::store::{Role, SessionStore};

pub async fn run(config: &Config, lesson: Option<String>, model: Option<String>) -> Result<()> {
    let store = SessionStore::load(paths::data_dir())?;
    let model = model.unwrap_or_else(|| config.model.clone());
    let client = GeminiClient::new(GeminiConfig::from_env(model, config)?);
    let mut controller = SessionController::new(store, client);

    let selected = match lesson {
        Some(id) => {
            if controller.snapshot().lessons.iter().all(|l| l.id != id) {
                bail!("No lesson with id {id}");
            }
            id
        }
        None => {
            let Some(latest) = controller.snapshot().lessons.first().map(|l| l.id.clone())
            else {
                println!(
                    "No lessons yet. Create one with: mentor lessons new --title ... --subject ..."
                );
                return Ok(());
            };
            latest
        }
    };
    controller.select_lesson(&selected);

    print_banner(&controller);
    print_history(&controller);

    let stdin = io::stdin();
    show_prompt()?;
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read input")?;
        let input = line.trim();

        match input {
            "" => {}
            ":q" => {
                println!("Goodbye!");
                return Ok(());
            }
            "/lessons" => print_lessons(&controller),
            "/summary" => send_shortcut(&mut controller, Shortcut::Summary).await?,
            "/flashcards" => send_shortcut(&mut controller, Shortcut::Flashcards).await?,
            "/quiz" => send_shortcut(&mut controller, Shortcut::Quiz).await?,
            _ if input.starts_with("/use ") => switch_lesson(&mut controller, input)?,
            _ if input.starts_with('/') => {
                println!("Unknown command: {input}");
            }
            _ => send(&mut controller, input).await?,
        }
        show_prompt()?;
    }
    // stdin closed without :q
    println!();
    Ok(())
}

fn print_banner<B>(controller: &SessionController<B>) {
    if let Some(lesson) = controller.active_lesson() {
        println!("mentor — {} ({})", lesson.title, lesson.subject);
    }
    println!("Type a question, /summary, /flashcards, /quiz, /lessons, /use <n>, :q to quit");
    println!();
}

fn print_history<B>(controller: &SessionController<B>) {
    for message in &controller.snapshot().messages_for_active {
        println!("{} {}", role_label(message.role), message.text);
    }
}

fn print_lessons<B>(controller: &SessionController<B>) {
    let snapshot = controller.snapshot();
    for (n, lesson) in snapshot.lessons.iter().enumerate() {
        let marker = if Some(&lesson.id) == snapshot.active_lesson_id.as_ref() {
            "*"
        } else {
            " "
        };
        println!("{marker} {}. {} ({})", n + 1, lesson.title, lesson.subject);
    }
}

fn switch_lesson<B>(controller: &mut SessionController<B>, input: &str) -> Result<()> {
    let n: usize = input
        .trim_start_matches("/use ")
        .trim()
        .parse()
        .context("Usage: /use <n> (a number from /lessons)")?;
    let snapshot = controller.snapshot();
    let Some(lesson) = n.checked_sub(1).and_then(|i| snapshot.lessons.get(i)) else {
        println!("No lesson {n}; see /lessons");
        return Ok(());
    };
    let id = lesson.id.clone();
    let title = lesson.title.clone();
    controller.select_lesson(&id);
    println!("Switched to {title}");
    Ok(())
}

async fn send<B: StreamingBackend>(
    controller: &mut SessionController<B>,
    text: &str,
) -> Result<()> {
    print!("Tutor: ");
    io::stdout().flush().ok();
    controller
        .send_message(text, |delta| {
            print!("{delta}");
            io::stdout().flush().ok();
        })
        .await?;
    finish_reply(controller);
    Ok(())
}

async fn send_shortcut<B: StreamingBackend>(
    controller: &mut SessionController<B>,
    shortcut: Shortcut,
) -> Result<()> {
    print!("Tutor: ");
    io::stdout().flush().ok();
    controller.send_shortcut(shortcut, |delta| {
        print!("{delta}");
        io::stdout().flush().ok();
    })
    .await?;
    finish_reply(controller);
    Ok(())
}

/// Prints the fixed error text when the reply failed (nothing streamed),
/// then ends the reply line.
fn finish_reply<B>(controller: &SessionController<B>) {
    let snapshot = controller.snapshot();
    if let Some(last) = snapshot.messages_for_active.last()
        && last.role == Role::Model
        && last.is_error
    {
        print!("{}", last.text);
    }
    println!();
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "You:",
        Role::Model => "Tutor:",
    }
}

fn show_prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush().context("Failed to flush stdout")
}
