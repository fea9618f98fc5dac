mod cli;
mod commands;
mod scene;

use anyhow::Result;
use clap::Parser;

use cli::Command;
use commands::render::RenderJob;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = cli::Cli::parse();

    match cli.command {
        Command::Plan { settings } => commands::plan::run(settings),
        Command::Render {
            output,
            width,
            height,
            sun,
            keep_original,
            settings,
        } => commands::render::run(RenderJob {
            output,
            width,
            height,
            sun,
            keep_original,
            settings,
        }),
    }
}
