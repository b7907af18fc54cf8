//! chatlens - ask questions about a group chat log
//!
//! Thin CLI over chatlens-core: pick a context mode, ask a question, and
//! print whichever answer path served it. Also exposes whole-log summary
//! and schema status views.

use anyhow::{Context, Result};
use chatlens_core::{AskResponse, ChatLens, Config, LogStatus, LogSummary};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "chatlens")]
#[command(about = "Ask questions about a group chat log")]
#[command(version)]
struct Args {
    /// Path to the SQLite chat log (overrides the configured path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print results as JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question from the chat history
    Ask {
        /// The question to answer
        question: String,

        /// Context mode: recent, monthly, or all
        #[arg(long, default_value = "recent")]
        context: String,
    },
    /// Whole-log statistics overview
    Summary,
    /// Detected schema and row count of the backing log
    Status,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration, then let the flag override the log path
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(db) = args.db {
        config.log.path = Some(db);
    }
    let _log_guard = chatlens_core::logging::init(&config.logging).ok();

    let lens = ChatLens::open(&config).context("failed to open chat log")?;

    match args.command {
        Command::Ask { question, context } => {
            let response = lens.ask(&question, &context)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_answer(&response);
            }
        }
        Command::Summary => {
            let summary = lens.summary().context("failed to summarize chat log")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Command::Status => {
            let status = lens.status().context("failed to inspect chat log")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status, lens.log_path());
            }
        }
    }

    Ok(())
}

fn print_answer(response: &AskResponse) {
    println!();
    println!("{}", response.answer.trim_end());
    println!();
    println!(
        "[{} | {} messages | confidence {:.2} | context: {}]",
        response.source.as_str(),
        response.message_count,
        response.confidence,
        response.context
    );
}

fn print_summary(summary: &LogSummary) {
    println!();
    println!("Chat log summary");
    println!();
    println!("  Rows:          {}", summary.total_events);
    println!("  Messages:      {}", summary.total_messages);
    println!("  Participants:  {}", summary.unique_participants);
    println!("  Groups:        {}", summary.unique_groups);
    if let (Some(start), Some(end)) = (summary.date_range.start, summary.date_range.end) {
        println!(
            "  Period:        {} to {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
    }
    if let Some(user) = &summary.most_active_user {
        println!("  Most active:   {}", user);
    }
    println!("  Avg per day:   {:.2}", summary.average_messages_per_day);
}

fn print_status(status: &LogStatus, path: &Path) {
    println!();
    println!("Chat log status");
    println!();
    println!("  Path:    {}", path.display());
    println!("  Schema:  {}", status.schema.as_str());
    println!("  Table:   {}", status.message_table);
    if let Some(user_table) = &status.user_table {
        println!("  Users:   {}", user_table);
    }
    println!("  Rows:    {}", status.total_rows);
}
