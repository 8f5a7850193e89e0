//! CLI entry point for `gmail-attachment-dl`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::builder::BoolishValueParser;
use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use gmail_attachment_dl::config::{self, BodyFormat, Config, RunOptions};
use gmail_attachment_dl::export::document::{resolve_renderer, FallbackRenderer};
use gmail_attachment_dl::gmail::auth::{self, AuthSettings};
use gmail_attachment_dl::gmail::GmailClient;
use gmail_attachment_dl::model::stats::RunStats;
use gmail_attachment_dl::pipeline::Orchestrator;
use gmail_attachment_dl::signal::{self, Interrupt};

/// Download Gmail attachments matching a search query.
#[derive(Parser)]
#[command(name = "gmail-attachment-dl", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Overrides for the configuration file. Each flag also reads its environment variable.
#[derive(Args)]
struct RunArgs {
    /// Directory where attachments are saved
    #[arg(short, long, env = "DOWNLOAD_PATH", value_name = "DIR")]
    output: Option<PathBuf>,

    /// Gmail search query
    #[arg(short, long, env = "SEARCH_QUERY")]
    query: Option<String>,

    /// Maximum number of messages to process
    #[arg(short = 'n', long, env = "MAX_MESSAGES")]
    max_messages: Option<usize>,

    /// Only messages on or after this date (YYYY/MM/DD)
    #[arg(long, env = "DATE_FROM", value_name = "YYYY/MM/DD")]
    date_from: Option<String>,

    /// Only messages before this date (YYYY/MM/DD)
    #[arg(long, env = "DATE_TO", value_name = "YYYY/MM/DD")]
    date_to: Option<String>,

    /// Only messages whose subject matches this regex (case-insensitive)
    #[arg(long, env = "SUBJECT_REGEX", value_name = "REGEX")]
    subject_regex: Option<String>,

    /// Only attachments whose filename matches this regex (case-insensitive)
    #[arg(long, env = "FILENAME_REGEX", value_name = "REGEX")]
    filename_regex: Option<String>,

    /// Store each message's files in a `{subject}_{id}` folder
    #[arg(long, env = "GROUP_BY_SUBJECT", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    group_by_subject: Option<bool>,

    /// Save the message body when a message has no matching attachment
    #[arg(long, env = "SAVE_EMAIL_AS_PDF", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    save_body: Option<bool>,

    /// Format of saved message bodies
    #[arg(long, env = "BODY_FORMAT", value_enum)]
    body_format: Option<BodyFormat>,

    /// Stored OAuth2 token file
    #[arg(long, env = "GMAIL_TOKEN_FILE", value_name = "FILE")]
    token_file: Option<PathBuf>,

    /// OAuth2 client secrets file
    #[arg(long, env = "GMAIL_CREDENTIALS_FILE", value_name = "FILE")]
    credentials_file: Option<PathBuf>,

    /// Use this access token instead of the token file
    #[arg(long, env = "GMAIL_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl RunArgs {
    /// Layer command-line and environment values over the file configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(ref v) = self.output {
            config.download.download_path = v.clone();
        }
        if let Some(ref v) = self.query {
            config.download.search_query = v.clone();
        }
        if let Some(v) = self.max_messages {
            config.download.max_messages = v;
        }
        if self.date_from.is_some() {
            config.download.date_from = self.date_from.clone();
        }
        if self.date_to.is_some() {
            config.download.date_to = self.date_to.clone();
        }
        if self.subject_regex.is_some() {
            config.filter.subject_regex = self.subject_regex.clone();
        }
        if self.filename_regex.is_some() {
            config.filter.filename_regex = self.filename_regex.clone();
        }
        if let Some(v) = self.group_by_subject {
            config.output.group_by_subject = v;
        }
        if let Some(v) = self.save_body {
            config.output.save_body_if_no_attachment = v;
        }
        if let Some(v) = self.body_format {
            config.output.body_format = v;
        }
        if let Some(ref v) = self.token_file {
            config.auth.token_file = v.clone();
        }
        if let Some(ref v) = self.credentials_file {
            config.auth.credentials_file = v.clone();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = config::load_config();
    let mut config = match &loaded {
        Ok(Some((_, cfg))) => cfg.clone(),
        _ => Config::default(),
    };
    cli.run.apply(&mut config);

    // Configure logging: stderr + log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match loaded {
        Ok(Some((path, _))) => tracing::info!(path = %path.display(), "Loaded config"),
        Ok(None) => tracing::debug!("No config file found, using defaults"),
        Err(e) => tracing::warn!(error = %e, "Failed to load config, using defaults"),
    }

    match cli.command {
        Some(Commands::Config) => cmd_config(&config),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => cmd_run(&cli.run, &config),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "gmail_downloader.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Print the merged configuration.
fn cmd_config(config: &Config) -> anyhow::Result<()> {
    if let Some(path) = config::config_file_path() {
        println!("# config file: {}", path.display());
    }
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "gmail-attachment-dl", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Authenticate, run the pipeline, and print the summary.
fn cmd_run(args: &RunArgs, config: &Config) -> anyhow::Result<()> {
    let options = RunOptions::from_config(config);

    tracing::info!("Gmail attachment downloader starting");
    tracing::info!(
        download_path = %options.output_dir.display(),
        query = %options.query,
        max_messages = options.max_messages,
        group_by_subject = options.naming.group_by_subject,
        save_body = options.save_body_if_no_attachment,
        subject_filter = options.filters.subject.is_active(),
        filename_filter = options.filters.filename.is_active(),
        "Configuration"
    );

    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "cannot create download directory {}",
            options.output_dir.display()
        )
    })?;

    let auth_settings = AuthSettings {
        access_token: args.access_token.clone(),
        token_file: config.auth.token_file.clone(),
        credentials_file: config.auth.credentials_file.clone(),
        timeout: options.request_timeout,
    };
    let token = auth::access_token(&auth_settings).context("authentication failed")?;
    tracing::info!("Successfully authenticated with Gmail API");

    let client = GmailClient::new(token, options.request_timeout)?;
    let renderer = if options.save_body_if_no_attachment {
        resolve_renderer(config.output.body_format)
    } else {
        FallbackRenderer::Unavailable {
            reason: "saving message bodies is disabled".to_string(),
        }
    };

    let interrupt = Interrupt::new();
    if let Err(e) = signal::install_handler(interrupt.clone()) {
        tracing::warn!(error = %e, "Could not install interrupt handler");
    }

    let pb = if args.no_progress || args.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Downloading [{bar:40.cyan/blue}] {pos}/{len} messages")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let stats = Orchestrator::new(&client, &options, &renderer)
        .with_interrupt(interrupt)
        .run(&|current, total| {
            pb.set_length(total as u64);
            pb.set_position(current as u64);
        });
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    if args.json {
        print_summary_json(&stats, &options.output_dir, elapsed)?;
    } else {
        print_summary_table(&stats, &options.output_dir, elapsed);
    }

    Ok(())
}

/// Print the run summary as a human-readable table.
fn print_summary_table(stats: &RunStats, output: &Path, elapsed: std::time::Duration) {
    println!();
    if stats.interrupted {
        println!("  Download interrupted, partial summary:");
    } else {
        println!("  Download summary:");
    }
    println!("  {}", "-".repeat(40));
    println!("  {:<25} {}", "Messages found", stats.messages_listed);
    println!("  {:<25} {}", "Messages processed", stats.messages_processed);
    println!("  {:<25} {}", "Messages filtered", stats.messages_filtered);
    println!("  {:<25} {}", "Attachments found", stats.attachments_found);
    println!("  {:<25} {}", "Attachments skipped", stats.attachments_skipped);
    println!("  {:<25} {}", "Files saved", stats.artifacts_produced);
    if stats.documents_rendered > 0 {
        println!("  {:<25} {}", "  of which message bodies", stats.documents_rendered);
    }
    if stats.failures > 0 {
        println!("  {:<25} {}", "Failures", stats.failures);
    }
    println!("  {:<25} {}", "Download location", output.display());
    println!("  {:<25} {:.2?}", "Elapsed", elapsed);
    println!();
}

/// Print the run summary as JSON.
fn print_summary_json(
    stats: &RunStats,
    output: &Path,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    let summary = serde_json::json!({
        "stats": stats,
        "download_path": output.to_string_lossy(),
        "elapsed_ms": elapsed.as_millis(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
