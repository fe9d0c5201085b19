//! VerifyMe CLI
//!
//! Disposable inboxes that read their own verification emails.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use verifyme_core::{Classifier, ClassifierConfig, EmailMessage, VerificationArtifact};
use verifyme_mail::{MailConfig, MailTmClient};
use verifyme_runtime::{spawn_poller, FoundVerification, Poller, PollerConfig, StateStore};

#[derive(Parser)]
#[command(name = "verifyme")]
#[command(author, version, about = "VerifyMe: disposable inboxes that read their own verification emails", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,

    /// State file holding the inbox identity and the last result
    #[arg(long, env = "VERIFYME_STATE", default_value = "verifyme-state.json")]
    state: PathBuf,

    /// Mail API base URL
    #[arg(long, env = "MAILTM_API_BASE", default_value = "https://api.mail.tm")]
    api_base: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a stored email and print the artifact as JSON
    Classify {
        /// HTML body file
        #[arg(long)]
        html: Option<PathBuf>,

        /// Plain-text body file
        #[arg(long)]
        text: Option<PathBuf>,

        /// JSON message file with `html` and/or `text` fields
        #[arg(long, conflicts_with_all = ["html", "text"])]
        json: Option<PathBuf>,

        /// TOML file overriding keyword lists and weights
        #[arg(short, long)]
        keywords: Option<PathBuf>,

        /// Show the rule that fired and every ranked link
        #[arg(long)]
        explain: bool,
    },

    /// Create a new disposable inbox
    Generate,

    /// Poll the inbox until a code or confirmation link arrives
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value = "5000")]
        interval_ms: u64,

        /// Maximum runtime in seconds (0 = until found or Ctrl-C)
        #[arg(long, default_value = "0")]
        timeout: u64,

        /// TOML file overriding keyword lists and weights
        #[arg(short, long)]
        keywords: Option<PathBuf>,
    },

    /// Show the last result
    Show,

    /// Ignore the message behind the last result
    Dismiss,

    /// Forget the dismissed message
    Reset,

    /// Check the mail API is reachable
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mail_config = MailConfig::default().with_api_base(&cli.api_base);
    let store = StateStore::new(&cli.state);

    match cli.command {
        Commands::Classify {
            html,
            text,
            json,
            keywords,
            explain,
        } => {
            run_classify(html, text, json, keywords.as_deref(), explain)?;
        }
        Commands::Generate => {
            generate(mail_config, &store).await?;
        }
        Commands::Watch {
            interval_ms,
            timeout,
            keywords,
        } => {
            let poller_config = PollerConfig {
                poll_interval_ms: interval_ms,
                max_runtime_secs: timeout,
                ..Default::default()
            };
            watch(mail_config, store, poller_config, keywords.as_deref()).await?;
        }
        Commands::Show => {
            let state = store.load().await?;
            if let Some(identity) = &state.identity {
                println!("📬 Inbox: {}", identity.address);
            }
            match state.last_found {
                Some(found) => print_found(&found),
                None => println!("⌛ Nothing found yet."),
            }
        }
        Commands::Dismiss => match store.dismiss().await? {
            Some(id) => println!("🙈 Ignoring message {}", id),
            None => println!("Nothing to dismiss."),
        },
        Commands::Reset => {
            store.reset_session().await?;
            println!("♻️  Dismissed message cleared.");
        }
        Commands::Status => {
            check_status(mail_config).await?;
        }
    }

    Ok(())
}

fn load_classifier(keywords: Option<&Path>) -> Result<Classifier> {
    let config = match keywords {
        Some(path) => ClassifierConfig::load(path)
            .with_context(|| format!("loading keywords from {}", path.display()))?,
        None => ClassifierConfig::default(),
    };
    Ok(Classifier::new(config)?)
}

fn read_optional(path: Option<PathBuf>) -> Result<Option<String>> {
    path.map(|p| fs::read_to_string(&p).with_context(|| format!("reading {}", p.display())))
        .transpose()
}

fn run_classify(
    html: Option<PathBuf>,
    text: Option<PathBuf>,
    json: Option<PathBuf>,
    keywords: Option<&Path>,
    explain: bool,
) -> Result<()> {
    let classifier = load_classifier(keywords)?;

    let message = match json {
        Some(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<EmailMessage>(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => EmailMessage {
            html: read_optional(html)?.map(Into::into),
            text: read_optional(text)?.map(Into::into),
        },
    };

    if explain {
        print_explanation(&classifier, &message);
    }

    let artifact: Option<VerificationArtifact> = classifier.classify_message(&message);
    println!("{}", serde_json::to_string_pretty(&artifact)?);

    Ok(())
}

fn print_explanation(classifier: &Classifier, message: &EmailMessage) {
    let explanation = classifier.explain(message.html_body(), message.text_body());

    eprintln!("Code rules: {}", classifier.rule_names().join(" > "));
    match &explanation.code {
        Some(code) => eprintln!("Code {} matched by rule {}", code.value, code.rule),
        None => eprintln!("No code matched"),
    }

    if explanation.candidates.is_empty() {
        eprintln!("No link candidates");
    }
    for (rank, candidate) in explanation.candidates.iter().enumerate() {
        eprintln!("#{} [{}] {}", rank + 1, candidate.score, candidate.url);
    }
}

async fn generate(mail_config: MailConfig, store: &StateStore) -> Result<()> {
    println!("🔧 Creating a disposable inbox...");

    let client = MailTmClient::new(mail_config)?;
    let identity = client.provision().await?;
    let address = identity.address.clone();

    store.set_identity(identity).await?;

    println!("✅ Inbox ready: {}", address);
    println!("   Use it in a sign-up form, then run: verifyme watch");
    Ok(())
}

async fn watch(
    mail_config: MailConfig,
    store: StateStore,
    poller_config: PollerConfig,
    keywords: Option<&Path>,
) -> Result<()> {
    let state = store.load().await?;
    let identity = state
        .identity
        .ok_or_else(|| anyhow::anyhow!("No inbox yet. Run `verifyme generate` first"))?;

    let classifier = load_classifier(keywords)?;
    let inbox = MailTmClient::new(mail_config)?.inbox(&identity);

    println!("👀 Watching {} (Ctrl-C to stop)", identity.address);

    let poller = Poller::new(poller_config, Arc::new(inbox), Arc::new(store), classifier);
    let (mut handle, shutdown) = spawn_poller(poller);

    let result = tokio::select! {
        joined = &mut handle => joined?,
        _ = tokio::signal::ctrl_c() => {
            let _ = shutdown.send(true);
            handle.await?
        }
    };

    match result? {
        Some(found) => print_found(&found),
        None => println!("\n⚠️  Stopped without finding a verification email."),
    }

    Ok(())
}

fn print_found(found: &FoundVerification) {
    println!("\n🔔 {}", found.notification_title());
    println!("   {}", found.notification_message());
    println!("   Subject: {}", found.subject);
    match &found.artifact {
        VerificationArtifact::Otp { value } => println!("   Code: {}", value),
        VerificationArtifact::Link { value } => println!("   Link: {}", value),
    }
}

async fn check_status(mail_config: MailConfig) -> Result<()> {
    println!("🔌 Checking mail API...\n");

    let api_base = mail_config.api_base.clone();
    let client = MailTmClient::new(mail_config)?;

    match client.check_connection().await {
        Ok(true) => {
            println!("✅ Mail API is reachable");
            println!("   Endpoint: {}", api_base);
        }
        Ok(false) => {
            println!("❌ Mail API is not reachable");
            println!("   Expected endpoint: {}", api_base);
        }
        Err(e) => {
            println!("❌ Error checking mail API: {}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch() {
        let cli = Cli::try_parse_from(["verifyme", "watch", "--interval-ms", "1000", "--timeout", "60"]).unwrap();
        match cli.command {
            Commands::Watch {
                interval_ms,
                timeout,
                keywords,
            } => {
                assert_eq!(interval_ms, 1000);
                assert_eq!(timeout, 60);
                assert!(keywords.is_none());
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_example_keywords_parse() {
        let config = ClassifierConfig::from_toml_str(include_str!("../keywords.example.toml")).unwrap();
        assert!(config.ignore_keywords.iter().any(|k| k == "twitter"));
        assert!(Classifier::new(config).is_ok());
    }

    #[test]
    fn test_json_conflicts_with_bodies() {
        let result = Cli::try_parse_from(["verifyme", "classify", "--json", "m.json", "--text", "t.txt"]);
        assert!(result.is_err());
    }
}
