use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use model_manager::{FetchOutcome, ModelReference};
use onprem::cli::{Cli, Command};
use onprem::{Llm, LlmOptions, PromptTemplate};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = settings::load(cli.config.as_deref()).context("failed to load settings")?;
    cli.apply(&mut settings);
    logging::init(&settings.logging)?;

    match cli.command {
        Command::Download { .. } => {
            let model = &settings.model;
            let outcome = Llm::download_model(
                model.effective_url(),
                model.download_path.as_deref(),
                model.confirm,
                model.verify_tls,
            )
            .await?;
            match &outcome {
                FetchOutcome::Downloaded { bytes, .. } => info!("Downloaded {} bytes", bytes),
                FetchOutcome::AlreadyPresent(_) => info!("Model already present"),
                FetchOutcome::Declined(_) => return Ok(()),
            }
            println!("{}", outcome.path().display());
        }
        Command::Path { .. } => {
            let reference = ModelReference::new(settings.model.effective_url())?;
            let path = reference.resolve_path(settings.model.download_path.as_deref())?;
            println!("{}", path.display());
        }
        Command::Prompt { text, template, .. } => {
            let template = template
                .as_deref()
                .map(str::parse::<PromptTemplate>)
                .transpose()?;
            let llm = Llm::new(LlmOptions::from(&settings)).await?;
            let output = llm.prompt(&text, template.as_ref()).await?;
            if settings.generation.mute_stream {
                println!("{}", output);
            } else {
                println!();
            }
        }
    }

    Ok(())
}
