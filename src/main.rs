use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    nav_server::logging::init().context("init logging")?;

    let cli = nav_server::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        nav_server::cli::Command::Serve(args) => {
            nav_server::app::serve(args).await.context("serve")?;
        }
        nav_server::cli::Command::Spider(args) => {
            let elapsed = nav_server::spider::run(args).await.context("spider")?;
            println!("{}", elapsed.as_secs());
        }
        nav_server::cli::Command::Seo(args) => {
            let template = nav_server::writer::run_seo(args).await.context("seo")?;
            println!("{}", template.display());
        }
    }

    Ok(())
}
