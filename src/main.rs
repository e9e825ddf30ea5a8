use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use interfile_xnat::config::AppConfig;
use interfile_xnat::{
    interfile_listmode_to_xnat, InMemoryXnat, RestXnatClient, ScanTarget, UploadRequest,
    UploadSettings, Uploader, XmlSchema, XnatClient,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Convert interfile list-mode headers into XNAT scan fields and upload them
#[derive(Debug, Parser)]
#[command(name = "interfile-xnat", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the flattened fields of a header as JSON
    Flatten(FlattenArgs),
    /// Create subject, experiment and scan on XNAT and upload the raw files
    Upload(UploadArgs),
}

#[derive(Debug, Args)]
struct FlattenArgs {
    /// Interfile list-mode header (`.l.hdr`)
    #[arg(long)]
    header: PathBuf,

    /// XSD to validate against (default from config)
    #[arg(long)]
    schema: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct UploadArgs {
    #[arg(long)]
    header: PathBuf,

    #[arg(long)]
    schema: Option<PathBuf>,

    #[arg(long)]
    project: String,

    /// Defaults to `Subj-<timestamp>`
    #[arg(long)]
    subject: Option<String>,

    /// Defaults to `Exp-<timestamp>`
    #[arg(long)]
    experiment: Option<String>,

    #[arg(long)]
    scan: Option<String>,

    /// Create the project if the server does not have it
    #[arg(long)]
    create_project: bool,

    /// Run against an in-memory server instead of XNAT
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    interfile_xnat::init_logging();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Flatten(args) => flatten(args, &config),
        Command::Upload(args) => upload(args, &config).await,
    }
}

fn load_schema(path: Option<PathBuf>, config: &AppConfig) -> anyhow::Result<XmlSchema> {
    let path = path.unwrap_or_else(|| PathBuf::from(&config.upload.schema_path));
    XmlSchema::from_file(&path).with_context(|| format!("Failed to load schema {}", path.display()))
}

fn flatten(args: FlattenArgs, config: &AppConfig) -> anyhow::Result<()> {
    let schema = load_schema(args.schema, config)?;
    let header = std::fs::read(&args.header)
        .with_context(|| format!("Failed to read header {}", args.header.display()))?;

    let fields = interfile_listmode_to_xnat(&header, &schema, &config.flatten.options())?;
    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}

async fn upload(args: UploadArgs, config: &AppConfig) -> anyhow::Result<()> {
    let schema = load_schema(args.schema, config)?;

    let scan = args
        .scan
        .unwrap_or_else(|| config.upload.default_scan.clone());
    let mut target = ScanTarget::timestamped(args.project, scan);
    if let Some(subject) = args.subject {
        target.subject = subject;
    }
    if let Some(experiment) = args.experiment {
        target.experiment = experiment;
    }

    let client: Arc<dyn XnatClient> = if args.dry_run {
        log::info!("Dry run: uploading to an in-memory server");
        Arc::new(InMemoryXnat::with_project(&target.project))
    } else {
        log::info!("Connecting to XNAT server {}", config.xnat.url);
        Arc::new(RestXnatClient::new(&config.xnat).context("Failed to create XNAT client")?)
    };

    let uploader = Uploader::new(client, Arc::new(schema), UploadSettings::from_config(config));
    let request = UploadRequest {
        header: args.header,
        target,
        create_project: args.create_project,
    };
    let summary = uploader.upload_interfile_data(&request).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_flags() {
        let cli = Cli::parse_from([
            "interfile-xnat",
            "upload",
            "--header",
            "scan.l.hdr",
            "--project",
            "interfile_project",
            "--create-project",
            "--dry-run",
        ]);

        let Command::Upload(args) = cli.command else {
            panic!("Expected upload command");
        };
        assert_eq!(args.project, "interfile_project");
        assert!(args.create_project);
        assert!(args.dry_run);
        assert!(args.subject.is_none());
    }
}
