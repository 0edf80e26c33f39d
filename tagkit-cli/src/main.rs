//! Command-line entry point for tag provisioning and route activation.
//!
//! Thin dispatch over `tagkit-core`: clap validates the argument surface,
//! the adapters for the reader helper and the verification gateway are
//! constructed once here, and every subcommand hands already-validated
//! parameters to the core.

mod driver;
mod manifest;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use eyre::{bail, eyre, Result};
use tagkit_core::activation::{ActivationPolicy, RouteActivator};
use tagkit_core::programmer::TagProgrammer;
use tagkit_core::sequence;
use tagkit_core::store;
use tagkit_core::types::{MasterKey, TagUid};
use tagkit_core::uploader::BatchUploader;
use tagkit_core::verifier::HttpVerifierClient;
use tracing_subscriber::EnvFilter;

use crate::driver::HelperProcessDriver;

/// Gateway the verification service listens on during local development.
const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:4943";

/// Host suffix for tag URIs constructed from a service id and page.
const LOCAL_GATEWAY_HOST: &str = "localhost:4943";

/// All-zero transport key unprovisioned tags ship with.
const DEFAULT_KEY_HEX: &str = "00000000000000000000000000000000";

#[derive(Parser)]
#[command(
    name = "tagkit",
    version,
    about = "NFC tag provisioning and route activation"
)]
struct Cli {
    /// Base URL of the verification gateway.
    #[arg(
        long,
        global = true,
        env = "TAGKIT_GATEWAY_URL",
        default_value = DEFAULT_GATEWAY_URL
    )]
    gateway_url: String,

    /// Reader helper executable implementing the tag driver protocol.
    #[arg(
        long,
        global = true,
        env = "TAGKIT_DRIVER_CMD",
        default_value = "ufr-helper"
    )]
    driver_cmd: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Program a tag with a URI credential.
    Program(ProgramArgs),
    /// Generate the counter-indexed code sequence for a tag.
    Cmacs(CmacsArgs),
    /// Upload a persisted code sequence to the verification service.
    Upload(UploadArgs),
    /// Register, upload and activate a protected route for a tag.
    SetupRoute(SetupRouteArgs),
    /// Read back the URI stored on a present tag.
    Read,
}

#[derive(Args)]
struct ProgramArgs {
    /// Service identifier used to construct the tag URI.
    #[arg(long)]
    service_id: Option<String>,

    /// Page path used to construct the tag URI.
    #[arg(long)]
    page: Option<String>,

    /// Complete URI to program (alternative to --service-id and --page).
    #[arg(long)]
    uri: Option<String>,

    /// Optional query parameter name to append to the URI.
    #[arg(long, default_value = "")]
    param_name: String,

    /// Optional query parameter value to append to the URI.
    #[arg(long, default_value = "")]
    param_value: String,

    /// Diversify a fresh random key onto the tag.
    #[arg(long)]
    random_key: bool,

    /// Activate route protection after programming.
    #[arg(long)]
    protect_route: bool,
}

#[derive(Args)]
struct CmacsArgs {
    /// Tag UID as hex.
    #[arg(long)]
    uid: String,

    /// Master key as hex.
    #[arg(long, default_value = DEFAULT_KEY_HEX)]
    key: String,

    /// Number of codes to generate, for counters 1 through the count.
    #[arg(long, default_value_t = 30)]
    count: u32,

    /// Output file path.
    #[arg(long, default_value = "cmacs.json")]
    output: PathBuf,
}

#[derive(Args)]
struct UploadArgs {
    /// Sequence file to upload.
    #[arg(long)]
    file: PathBuf,

    /// Service the route belongs to.
    #[arg(long)]
    service_id: String,

    /// Page path of the protected route.
    #[arg(long)]
    page: String,
}

#[derive(Args)]
struct SetupRouteArgs {
    /// Service the route belongs to, or `auto` to resolve from the project
    /// manifest.
    #[arg(long)]
    service_id: String,

    /// Page path to protect.
    #[arg(long)]
    page: String,

    /// UID of the tag backing the route, as hex.
    #[arg(long)]
    uid: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Program(args) => cmd_program(&cli, args).await,
        Command::Cmacs(args) => cmd_cmacs(args),
        Command::Upload(args) => cmd_upload(&cli, args).await,
        Command::SetupRoute(args) => cmd_setup_route(&cli, args).await,
        Command::Read => cmd_read(&cli),
    }
}

/// Builds the URI a `program` invocation writes to the tag.
fn tag_uri(args: &ProgramArgs) -> Result<String> {
    if let Some(service_id) = &args.service_id {
        let page = args
            .page
            .as_deref()
            .ok_or_else(|| eyre!("--page is required when using --service-id"))?;
        Ok(format!("http://{service_id}.{LOCAL_GATEWAY_HOST}/{page}"))
    } else {
        args.uri
            .clone()
            .ok_or_else(|| eyre!("either --service-id and --page, or --uri must be provided"))
    }
}

async fn cmd_program(cli: &Cli, args: &ProgramArgs) -> Result<()> {
    let uri = tag_uri(args)?;
    let mut programmer = TagProgrammer::new(HelperProcessDriver::new(&cli.driver_cmd));
    let report = programmer.program(&uri, &args.param_name, &args.param_value, args.random_key)?;

    if !report.written {
        match report.uid {
            Some(uid) => bail!("tag {uid} rejected the write"),
            None => bail!("tag rejected the write"),
        }
    }

    if args.protect_route {
        let service_id = args
            .service_id
            .as_deref()
            .ok_or_else(|| eyre!("--service-id and --page are required for route protection"))?;
        let page = args
            .page
            .as_deref()
            .ok_or_else(|| eyre!("--service-id and --page are required for route protection"))?;
        let uid = report
            .uid
            .ok_or_else(|| eyre!("driver reported no uid; cannot activate the route"))?;

        if args.random_key {
            tracing::warn!(
                "route activation authenticates the factory key, but the tag now \
                 carries a diversified key; the service must be re-keyed out of band"
            );
        }
        activate(cli, service_id, page, &uid).await?;
    }
    Ok(())
}

fn cmd_cmacs(args: &CmacsArgs) -> Result<()> {
    let uid: TagUid = args.uid.parse()?;
    let key: MasterKey = args.key.parse()?;
    let end = args
        .count
        .checked_add(1)
        .ok_or_else(|| eyre!("--count is too large"))?;

    let sequence = sequence::generate(1, end, &uid, &key)?;
    store::save(&sequence, &args.output)?;
    println!(
        "wrote {} codes for tag {uid} to {}",
        sequence.count(),
        args.output.display()
    );
    Ok(())
}

async fn cmd_upload(cli: &Cli, args: &UploadArgs) -> Result<()> {
    let client = HttpVerifierClient::new(&cli.gateway_url);
    let summary = BatchUploader::new(&client)
        .upload(&args.file, &args.service_id, &args.page)
        .await?;
    println!(
        "uploaded {} records in {} batches for {}",
        summary.submitted, summary.batches, args.page
    );
    Ok(())
}

async fn cmd_setup_route(cli: &Cli, args: &SetupRouteArgs) -> Result<()> {
    let uid: TagUid = args.uid.parse()?;
    activate(cli, &args.service_id, &args.page, &uid).await
}

fn cmd_read(cli: &Cli) -> Result<()> {
    let mut programmer = TagProgrammer::new(HelperProcessDriver::new(&cli.driver_cmd));
    let uri = programmer.read_uri()?;
    println!("{uri}");
    Ok(())
}

/// Runs the full activation workflow, resolving `auto` service ids from the
/// project manifest first.
async fn activate(cli: &Cli, service_id: &str, page: &str, uid: &TagUid) -> Result<()> {
    let service_id = if service_id == "auto" {
        manifest::default_service_id(Path::new(manifest::DEFAULT_MANIFEST))?
    } else {
        service_id.to_string()
    };

    let client = HttpVerifierClient::new(&cli.gateway_url);
    RouteActivator::new(&client, ActivationPolicy::default())
        .activate(&service_id, page, uid)
        .await?;
    println!("route {page} active for tag {uid}");
    Ok(())
}
