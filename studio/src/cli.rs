use std::{net::SocketAddr, path::PathBuf};

use portrait_engine::provider::ProviderKind;

#[derive(Debug, clap::Parser)]
#[command(about = "Generate and edit portraits with Imagen/Gemini or Qwen-Image")]
pub struct Cli {
    /// Overrides IMAGE_PROVIDER and the config file
    #[arg(short, long)]
    pub provider: Option<ProviderKind>,

    /// RON config file, defaults to the one in the user config dir
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Paint a new portrait from a prompt
    Generate(Generate),
    /// Rework an existing image
    Edit(Edit),
    /// Serve the image proxy
    Proxy(Proxy),
}

#[derive(Debug, clap::Args)]
pub struct Generate {
    pub prompt: String,
    #[arg(short, long, default_value = "portrait.png")]
    pub output: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct Edit {
    /// Image file or `data:` URL
    pub image: String,
    pub prompt: String,
    #[arg(short, long, default_value = "portrait.png")]
    pub output: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct Proxy {
    #[arg(short, long, default_value = "127.0.0.1:5173")]
    pub bind: SocketAddr,
}
