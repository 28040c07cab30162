//! Story worker binary.
//!
//! Runs one document through the pipeline and prints the final status as
//! JSON.
//!
//! ```text
//! storyreel-worker <document.txt> [--grade-level L] [--voice V] [--style S]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use storyreel_models::StoryOptions;
use storyreel_state::{JobStore, StatusQuery};
use storyreel_storage::blob_store_from_env;
use storyreel_worker::{
    init_tracing, Generators, StoryPipeline, UsageBudget, WorkerConfig, PLACEHOLDER_TITLE,
};
use tracing::{error, info};

const USAGE: &str =
    "usage: storyreel-worker <document.txt> [--grade-level L] [--voice V] [--style S]";

#[derive(Debug)]
struct CliArgs {
    path: PathBuf,
    options: StoryOptions,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut path = None;
        let mut options = StoryOptions::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let slot = match arg.as_str() {
                "--grade-level" => &mut options.grade_level,
                "--voice" => &mut options.voice,
                "--style" => &mut options.style,
                flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
                _ => {
                    if path.replace(PathBuf::from(&arg)).is_some() {
                        bail!("only one document path is accepted");
                    }
                    continue;
                }
            };
            *slot = args
                .next()
                .with_context(|| format!("{} needs a value", arg))?;
        }

        Ok(Self {
            path: path.context(USAGE)?,
            options,
        })
    }
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    if let Err(e) = run().await {
        error!("storyreel-worker failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = CliArgs::parse(std::env::args().skip(1))?;
    let document_text = tokio::fs::read_to_string(&args.path)
        .await
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let store = Arc::new(match &config.state_dir {
        Some(dir) => JobStore::open(dir).await?,
        None => JobStore::in_memory(),
    });
    let blobs = blob_store_from_env().await?;
    let usage = Arc::new(UsageBudget::new(config.usage_limits));
    let generators = Generators::from_env()?;
    let pipeline = StoryPipeline::new(&config, Arc::clone(&store), generators, blobs, usage);

    let story_id = store
        .create_story(PLACEHOLDER_TITLE, args.options.clone())
        .await?;
    info!(story_id = %story_id, path = %args.path.display(), "Generating story");

    pipeline
        .run_to_completion(&story_id, &document_text, &args.options)
        .await?;

    let status = StatusQuery::new(store).get_status(&story_id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_path_and_options() {
        let parsed =
            CliArgs::parse(args(&["doc.txt", "--voice", "nova", "--style", "comic"])).unwrap();
        assert_eq!(parsed.path, PathBuf::from("doc.txt"));
        assert_eq!(parsed.options.voice, "nova");
        assert_eq!(parsed.options.style, "comic");
        assert_eq!(parsed.options.grade_level, StoryOptions::default().grade_level);
    }

    #[test]
    fn test_parse_rejects_missing_path_and_value() {
        assert!(CliArgs::parse(args(&[])).is_err());
        assert!(CliArgs::parse(args(&["doc.txt", "--voice"])).is_err());
        assert!(CliArgs::parse(args(&["doc.txt", "--speed", "2"])).is_err());
    }
}
