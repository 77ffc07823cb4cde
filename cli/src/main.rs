//! acp CLI binary.
//!
//! Subcommands: `serve` (HTTP server), `execute` (apply proposed actions to an artifact),
//! `review concept-set` / `review cohort` (deterministic rules plus the model when configured).

use std::path::PathBuf;

use acp::Assistant;
use clap::{Args as ClapArgs, Parser, Subcommand};
use cli::{execute, review_cohort, review_concept_set, write_json_output, ExecuteOptions};

#[derive(Parser, Debug)]
#[command(name = "acp")]
#[command(about = "acp: guarded actions and reviews for clinical-study artifacts")]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Print compact single-line JSON instead of pretty JSON
    #[arg(long, global = true)]
    compact: bool,

    /// Write the JSON result to this file instead of stdout
    #[arg(long, global = true, value_name = "PATH")]
    file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default 127.0.0.1:7777 or ACP_ADDR)
    Serve(ServeArgs),
    /// Apply proposed actions to an artifact (dry-run unless --write)
    Execute(ExecuteArgs),
    /// Review a concept set or cohort definition
    Review(ReviewArgs),
}

#[derive(ClapArgs, Debug)]
struct ServeArgs {
    /// Listen address, e.g. 127.0.0.1:7777
    #[arg(long, value_name = "ADDR")]
    addr: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct ExecuteArgs {
    /// Artifact reference: local path or http(s) URL
    #[arg(long, value_name = "REF")]
    artifact: String,

    /// JSON file with the actions array, or `-` for stdin
    #[arg(long, value_name = "FILE")]
    actions: String,

    /// Persist the result (local targets only)
    #[arg(long)]
    write: bool,

    /// Replace the target instead of writing a `-assistant-vN` sibling
    #[arg(long)]
    overwrite: bool,

    /// Skip the timestamped backup when overwriting
    #[arg(long)]
    no_backup: bool,

    /// Write here instead of the artifact path
    #[arg(long, value_name = "PATH")]
    output: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct ReviewArgs {
    #[command(subcommand)]
    target: ReviewTarget,
}

#[derive(Subcommand, Debug)]
enum ReviewTarget {
    /// Concept-set review (duplicates, mixed domains, missing descendants)
    ConceptSet {
        #[arg(long, value_name = "REF")]
        artifact: String,
        /// Study intent passed to the model
        #[arg(long, value_name = "TEXT")]
        intent: Option<String>,
    },
    /// Cohort lint (washout, inverted windows)
    Cohort {
        #[arg(long, value_name = "REF")]
        artifact: String,
    },
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let value = match args.cmd {
        Command::Serve(sa) => return serve::run_serve(sa.addr.as_deref()).await,
        Command::Execute(e) => {
            let options = ExecuteOptions {
                write: e.write,
                overwrite: e.overwrite,
                no_backup: e.no_backup,
                output: e.output,
            };
            execute(&e.artifact, &e.actions, options).await?
        }
        Command::Review(r) => {
            let assistant = Assistant::from_env();
            match r.target {
                ReviewTarget::ConceptSet { artifact, intent } => {
                    review_concept_set(&assistant, &artifact, intent).await?
                }
                ReviewTarget::Cohort { artifact } => review_cohort(&assistant, &artifact).await?,
            }
        }
    };
    write_json_output(&value, args.file.as_deref(), args.compact)?;
    Ok(())
}

#[tokio::main]
async fn main() {
    config::load_and_apply("acp", None).ok();
    let _log_guard = match config::logging::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("logging init failed: {}", e);
            None
        }
    };

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
