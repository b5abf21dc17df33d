mod cli;

use bytes::Bytes;
use clap::Parser;
use cli::{Cli, Commands, SubmitArgs};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quotebox::api::models::Attachment;
use quotebox::client::{self, Field};
use quotebox::config::Config;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => quotebox::api::run(args.address).await?,
        Commands::Submit(args) => submit(args).await?,
    }

    Ok(())
}

async fn submit(args: SubmitArgs) -> Result<(), AnyError> {
    let mut config = Config::load()?.client;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }

    let (coordinator, _focus) = client::headless(&config, args.token)?;

    coordinator.set_field(Field::Name, args.name);
    coordinator.set_field(Field::Email, args.email);
    coordinator.set_field(Field::Message, args.message);
    for (field, value) in [
        (Field::Company, args.company),
        (Field::Service, args.service),
        (Field::Budget, args.budget),
    ] {
        if let Some(value) = value {
            coordinator.set_field(field, value);
        }
    }

    if let Some(path) = args.file {
        let bytes = tokio::fs::read(&path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let content_type = mime_for(&filename);
        coordinator.set_attachment(Some(Attachment::new(filename, content_type, Bytes::from(bytes))));
    }

    info!(endpoint = %config.endpoint, "Submitting quote request");
    let response = coordinator.submit().await.map_err(|e| e.user_message())?;
    println!(
        "{} (id: {})",
        response.message,
        response.id.as_deref().unwrap_or("-")
    );
    Ok(())
}

fn mime_for(filename: &str) -> &'static str {
    let extension = filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        Some("zip") => "application/zip",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
