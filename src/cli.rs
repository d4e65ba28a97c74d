//! Command-line surface of the `onprem` binary

use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};

use settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "onprem", version, about = "Run large language models on your own machine")]
pub struct Cli {
    /// Configuration file, instead of the platform default
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging and verbose engine output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download a model into the data directory
    Download {
        #[command(flatten)]
        model: ModelArgs,

        /// Do not ask before downloading or replacing
        #[arg(short, long)]
        yes: bool,

        /// Skip TLS certificate verification
        #[arg(long)]
        insecure: bool,
    },
    /// Print where a model is stored
    Path {
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Send a prompt to the model and print the completion
    Prompt {
        text: String,

        /// Template with a {prompt} slot
        #[arg(short, long)]
        template: Option<String>,

        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Debug, Default, Args)]
pub struct ModelArgs {
    /// Model URL
    #[arg(long)]
    pub url: Option<String>,

    /// Use the larger default model
    #[arg(long)]
    pub larger: bool,

    /// Directory to store models in
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

impl ModelArgs {
    /// Overrides the loaded settings with whatever was passed on the command line
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.url {
            settings.model.url = url.clone();
            settings.model.use_larger = false;
        }
        if self.larger {
            settings.model.use_larger = true;
        }
        if let Some(dir) = &self.dir {
            settings.model.download_path = Some(dir.clone());
        }
    }
}

impl Cli {
    /// Folds the global flags and the subcommand flags into `settings`
    pub fn apply(&self, settings: &mut Settings) {
        if self.verbose {
            settings.logging.level = "debug".to_string();
            settings.generation.verbose = true;
        }
        match &self.command {
            Command::Download { model, yes, insecure } => {
                model.apply(settings);
                if *yes {
                    settings.model.confirm = false;
                }
                if *insecure {
                    settings.model.verify_tls = false;
                }
            }
            Command::Path { model } | Command::Prompt { model, .. } => model.apply(settings),
        }
    }
}
