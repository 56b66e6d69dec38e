//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use mentor_core::config::Config;
use mentor_core::logging;

mod commands;

#[derive(Parser)]
#[command(name = "mentor")]
#[command(version)]
#[command(about = "Terminal tutoring chat, one lesson at a time")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Open a tutoring chat in a lesson
    Chat {
        /// Lesson id to chat in (default: most recent lesson)
        #[arg(long, value_name = "ID")]
        lesson: Option<String>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage lessons
    Lessons {
        #[command(subcommand)]
        command: LessonCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum LessonCommands {
    /// List lessons, most recent first
    List {
        /// Only lessons whose title or subject contains this term
        #[arg(long, value_name = "TERM")]
        search: Option<String>,

        /// Group the listing by subject
        #[arg(long)]
        by_subject: bool,
    },
    /// Create a lesson
    New {
        #[arg(long)]
        title: String,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a lesson and its chat history
    Delete {
        /// Lesson id
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Write a commented default config file
    Init,
    /// Set the model and persist it
    SetModel { model: String },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    let _guard = logging::init_logging(&config.logging);

    match cli.command {
        Commands::Chat { lesson, model } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(commands::chat::run(&config, lesson, model))
        }
        Commands::Lessons { command } => match command {
            LessonCommands::List { search, by_subject } => {
                commands::lessons::list(search.as_deref(), by_subject)
            }
            LessonCommands::New {
                title,
                subject,
                description,
            } => commands::lessons::new(title, subject, description),
            LessonCommands::Delete { id, yes } => commands::lessons::delete(&id, yes),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetModel { model } => commands::config::set_model(&model),
        },
    }
}
