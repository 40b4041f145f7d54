mod cli;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use shmpatch::{PatchConfig, PatchProfile, load_profile};
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, usage_error_kind};

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(args.log_directive().parse()?))
        .with_writer(std::io::stderr)
        .init();

    let profile = match &args.profile {
        Some(path) => load_profile(path)
            .with_context(|| format!("Failed to load profile {}", path.display()))?,
        None => PatchProfile::default(),
    };

    let mut builder = PatchConfig::builder()
        .shm_folder(args.shm_folder.as_str())
        .depth_limit(args.depth)
        .output(args.output())
        .profile(profile);
    if !args.search_in.is_empty() {
        builder = builder.search_roots(args.search_in.iter().cloned());
    }
    let config = builder.build();

    let libraries = match shmpatch::run(&config) {
        Ok(libraries) => libraries,
        Err(e) => match usage_error_kind(&e) {
            Some(kind) => Args::command().error(kind, e).exit(),
            None => return Err(e.into()),
        },
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&libraries)?);
    }

    Ok(())
}
