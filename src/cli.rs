use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const CONFIG_FILE_NAME: &str = "nav.config.yaml";

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API and serve the front end.
    Serve(ServeArgs),
    /// Check every link once and record the results.
    Spider(RootArgs),
    /// Regenerate the SEO block in `dist/browser/index.html`.
    Seo(RootArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RootArgs {
    /// Directory holding `data/`, `dist/` and `_upload/`.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to `<root>/nav.config.yaml`).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl RootArgs {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.root.join(CONFIG_FILE_NAME))
    }
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub root: RootArgs,

    /// Listen address (defaults to `0.0.0.0:<port from config>`).
    #[arg(long)]
    pub addr: Option<SocketAddr>,

    /// Maximum request body size.
    #[arg(long, default_value_t = 50)]
    pub body_limit_mb: usize,

    /// Maximum concurrent background jobs (mail).
    #[arg(long, default_value_t = 4)]
    pub max_background_tasks: usize,
}
