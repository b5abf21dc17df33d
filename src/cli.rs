use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use quotebox::api::models::{BUDGET_OPTIONS, SERVICE_OPTIONS};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quotebox")]
#[command(about = "Quotebox intake service and submission client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the intake HTTP server
    Server(ServerArgs),
    /// Send one quote request to an intake endpoint
    Submit(SubmitArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (defaults to `server.bind_addr`)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct SubmitArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub message: String,

    #[arg(long)]
    pub company: Option<String>,

    /// Defaults to "Web Design"
    #[arg(long, value_parser = PossibleValuesParser::new(SERVICE_OPTIONS.iter().copied()))]
    pub service: Option<String>,

    /// Defaults to "$1k - $3k"
    #[arg(long, value_parser = PossibleValuesParser::new(BUDGET_OPTIONS.iter().copied()))]
    pub budget: Option<String>,

    /// File to attach (20 MiB at most)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Challenge token to submit; hCaptcha test keys accept a fixed token
    #[arg(long)]
    pub token: String,

    /// Intake endpoint (defaults to `client.endpoint`)
    #[arg(long)]
    pub endpoint: Option<String>,
}
