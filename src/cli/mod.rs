use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod clear;
pub mod init;
pub mod job;
pub mod send;
pub mod serve;

use job::JobId;

use crate::core::logging::init_tracing;

#[derive(Subcommand)]
enum Command {
    /// Create the subscription store schema
    Init {},
    /// Run the API server and periodic jobs
    Serve {
        /// Set the server host address
        #[arg(long, env = "PUSHD_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, env = "PUSHD_PORT", default_value = "4000")]
        port: String,
    },
    /// Broadcast a notification to every subscription
    Send {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
        /// URL opened when the notification is clicked
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Delete every stored subscription
    Clear {},
    /// Run a periodic job once
    Job {
        #[arg(long, value_enum)]
        id: JobId,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    // A missing .env file is fine, the environment may already be set
    let _ = dotenvy::dotenv();
    let args = Cli::parse();
    init_tracing();

    // Handle each sub command
    match args.command {
        Some(Command::Init {}) => {
            init::run().await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port).await?;
        }
        Some(Command::Send {
            title,
            body,
            url,
            tag,
        }) => {
            send::run(title, body, url, tag).await?;
        }
        Some(Command::Clear {}) => {
            clear::run().await?;
        }
        Some(Command::Job { id }) => {
            job::run(id).await?;
        }
        None => {}
    }

    Ok(())
}
