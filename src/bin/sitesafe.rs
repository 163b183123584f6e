//! sitesafe — SiteSafe Pro terminal client
//!
//! Query the API through the gateway client and take timed assessments.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Select};
use tokio::sync::mpsc;

use sitesafe::assessment::{self, Answers, Command as SessionCommand, SessionExit};
use sitesafe::storage::keys;
use sitesafe::{
    ClientStorage, Config, FileStorage, GatewayClient, GatewaySubmissionApi, Notice, Question,
    SessionHost, UserProfile,
};

/// SiteSafe Pro terminal client
#[derive(Parser)]
#[command(name = "sitesafe")]
#[command(version = sitesafe::PKG_VERSION)]
#[command(about = "SiteSafe Pro API client")]
struct Args {
    /// Config file (default: ~/.sitesafe/config.toml, then /etc/sitesafe/config.toml)
    #[arg(short, long, env = "SITESAFE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// GET a resource and print the JSON body
    Get {
        /// Path relative to the API base URL (e.g. /courses)
        path: String,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Store the bearer credential used for every request
    Login {
        /// Bearer token
        token: String,
        /// JSON file with the user profile to remember
        #[arg(long)]
        profile: Option<PathBuf>,
    },

    /// Show the stored user profile
    Whoami,

    /// Take (or resume) a timed assessment
    Quiz {
        /// JSON file with the session payload (omit to resume the stored session)
        #[arg(long)]
        payload: Option<PathBuf>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let storage: Arc<dyn ClientStorage> = Arc::new(FileStorage::new(config.storage_dir()));

    match args.command {
        Command::Get { path, params } => {
            let client = GatewayClient::from_config(config.gateway_config(), storage)?;
            let params: Vec<(&str, &str)> = params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            match client.get(&path, &params).await {
                Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                Err(e) if e.is_unauthorized() => {
                    eprintln!("not authorized; run `sitesafe login <token>` first");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Login { token, profile } => {
            storage.set_item(keys::TOKEN, token.trim())?;
            if let Some(path) = profile {
                let raw = std::fs::read_to_string(&path)?;
                let profile: UserProfile = serde_json::from_str(&raw)?;
                profile.save(storage.as_ref())?;
            }
            println!("credential stored");
        }

        Command::Whoami => {
            let signed_in = storage.get_item(keys::TOKEN)?.is_some();
            match UserProfile::load(storage.as_ref())? {
                Some(profile) => {
                    println!("id:    {}", profile.id);
                    println!("name:  {}", profile.name.as_deref().unwrap_or("—"));
                    println!("email: {}", profile.email.as_deref().unwrap_or("—"));
                    println!(
                        "role:  {}",
                        profile.role.map(|r| r.to_string()).unwrap_or_else(|| "—".into())
                    );
                }
                None if signed_in => println!("credential stored, no profile"),
                None => println!("not signed in"),
            }
        }

        Command::Quiz { payload } => {
            let client = GatewayClient::from_config(config.gateway_config(), storage.clone())?;
            run_quiz(client, storage, payload).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Quiz
// ============================================================================

async fn run_quiz(
    client: GatewayClient,
    storage: Arc<dyn ClientStorage>,
    payload: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let candidate = match payload {
        Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(&path)?)?),
        None => None,
    };

    let host = TerminalHost;
    let Some(session) = assessment::open_session(candidate, storage, &host).await else {
        std::process::exit(1);
    };

    println!(
        "{}session {}: {} questions, {} remaining",
        if session.is_retake() { "retake " } else { "" },
        session.session_id(),
        session.total_questions(),
        format_remaining(session.remaining()),
    );

    let (tx, rx) = mpsc::channel(16);
    let questions = session.questions().to_vec();
    let answers = session.answers().clone();
    // dialoguer blocks; a detached thread does not hold up process exit.
    std::thread::spawn(move || prompt_loop(questions, answers, tx));

    let api = GatewaySubmissionApi::new(client);
    match assessment::run_session(session, rx, &host, &api).await {
        SessionExit::Detached => {
            println!("progress saved; run `sitesafe quiz` again to resume");
        }
        SessionExit::Submitted { .. } | SessionExit::ClosedUnanswered | SessionExit::Exited => {}
    }
    Ok(())
}

/// Prints notices. Confirmation happens in [`prompt_loop`] before
/// `Submit` is sent, so `confirm_submission` passes through.
struct TerminalHost;

#[async_trait]
impl SessionHost for TerminalHost {
    async fn notify(&self, notice: Notice) {
        eprintln!("\n{notice}");
    }

    async fn confirm_submission(&self, _answered: usize, _total: usize) -> bool {
        true
    }

    async fn leave(&self) {
        println!("returning to the assessment list");
    }

    async fn on_tick(&self, remaining: Duration) {
        let secs = remaining.as_secs();
        if secs == 300 || secs == 60 {
            eprintln!("\n{} remaining", format_remaining(remaining));
        }
    }
}

fn prompt_loop(questions: Vec<Question>, mut answers: Answers, tx: mpsc::Sender<SessionCommand>) {
    const ACTIONS: [&str; 4] = ["→ next", "← previous", "✓ submit", "✗ exit"];
    let mut index = 0;

    loop {
        let question = &questions[index];
        let mut items: Vec<String> = question
            .options
            .iter()
            .map(|option| {
                let marker = if answers.get(&question.id) == Some(option) { "●" } else { " " };
                format!("{marker} {option}")
            })
            .collect();
        items.extend(ACTIONS.iter().map(|a| a.to_string()));

        let prompt = format!("[{}/{}] {}", index + 1, questions.len(), question.text);
        // Interrupted: drop the sender so the session detaches and stays resumable.
        let Ok(choice) = Select::new()
            .with_prompt(prompt)
            .items(&items)
            .default(0)
            .interact()
        else {
            break;
        };

        let command = if choice < question.options.len() {
            let option = question.options[choice].clone();
            answers.insert(question.id.clone(), option.clone());
            SessionCommand::Select {
                question_id: question.id.clone(),
                option,
            }
        } else {
            match choice - question.options.len() {
                0 => {
                    index = (index + 1).min(questions.len() - 1);
                    SessionCommand::Next
                }
                1 => {
                    index = index.saturating_sub(1);
                    SessionCommand::Previous
                }
                2 => {
                    if !answers.is_empty()
                        && !confirm(&format!(
                            "Submit with {} of {} questions answered?",
                            answers.len(),
                            questions.len()
                        ))
                    {
                        continue;
                    }
                    SessionCommand::Submit
                }
                _ => SessionCommand::Exit,
            }
        };

        let exiting = command == SessionCommand::Exit;
        if tx.blocking_send(command).is_err() || exiting {
            break;
        }
    }
}

/// confirm a prompt with the user; returns false if declined.
fn confirm(prompt: &str) -> bool {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}

fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
