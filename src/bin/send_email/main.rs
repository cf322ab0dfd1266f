#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Sends one email through the configured sender

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use email_sender::{
    domain::communication::{senders::EmailSender, Message, SendContext},
    infrastructure::{config::EmailSenderConfig, email_sender::EmailSenders},
};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
pub struct Args {
    /// The email sender configuration
    #[clap(flatten)]
    pub sender: EmailSenderConfig,

    /// The message to send
    #[clap(flatten)]
    pub message: MessageArgs,

    /// Service access token used to call the config service
    #[arg(long, env = "SERVICE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Give up after this many seconds
    #[arg(long, env = "SEND_EMAIL_DEADLINE_SECS")]
    pub deadline_secs: Option<u64>,
}

/// Message fields
#[derive(Debug, Parser)]
pub struct MessageArgs {
    /// The namespace sending the email
    #[arg(long, default_value = "")]
    pub namespace: String,

    /// The recipient
    #[arg(long)]
    pub to: String,

    /// The subject
    #[arg(long, default_value = "")]
    pub subject: String,

    /// Sender address, ignored by the static sender
    #[arg(long)]
    pub from: Option<String>,

    /// Sender display name, ignored by the static sender
    #[arg(long)]
    pub display_name: Option<String>,

    /// Reply-to address
    #[arg(long)]
    pub reply_to: Option<String>,

    /// Template id or name
    #[arg(long)]
    pub template: Option<String>,

    /// Merge variable as `key=value`, values are parsed as JSON when possible
    #[arg(long = "merge-var", value_parser = parse_merge_var)]
    pub merge_vars: Vec<(String, Value)>,

    /// Category tag
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Carbon-copy recipient
    #[arg(long = "cc")]
    pub carbon_copy: Vec<String>,
}

impl From<MessageArgs> for Message {
    fn from(args: MessageArgs) -> Self {
        Message {
            namespace: args.namespace,
            from: args.from,
            from_name: args.display_name,
            to: args.to,
            subject: args.subject,
            reply_to: args.reply_to,
            template: args.template,
            merge_vars: args.merge_vars.into_iter().collect(),
            categories: args.categories,
            carbon_copy: args.carbon_copy,
        }
    }
}

fn parse_merge_var(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got {raw:?}"))?;

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    Ok((key.to_string(), value))
}

/// Deadline `secs` from now, or none when that is past the end of the clock.
fn deadline_after(secs: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(secs))
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let sender =
        EmailSenders::from_config(&args.sender).context("failed to build email sender")?;

    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.cancel();
            }
        }
    });

    let mut ctx = SendContext::new().with_cancellation(cancellation);
    if let Some(token) = args.access_token {
        ctx = ctx.with_access_token(token);
    }
    if let Some(deadline) = args.deadline_secs.and_then(deadline_after) {
        ctx = ctx.with_deadline(deadline);
    }

    let message = Message::from(args.message);
    let to = message.to.clone();

    match sender.send_email(&ctx, message).await {
        Ok(()) => {
            info!(to, "email sent");
            Ok(())
        }
        Err(e) => {
            error!(to, "failed to send email: {}", e);
            Err(e.into())
        }
    }
}
