use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use flowship_config::PublicationDef;
use flowship_credentials::{CredentialRegistry, FsCredentialRegistry};
use flowship_events::{PublishContext, TracingObserver};
use flowship_publisher::PublicationCoordinator;
use flowship_record::{FsRecordStore, RecordStore};
use flowship_registry::{DEFAULT_DOCKER_SOCKET, DockerTransport};
use flowship_resolver::{ResolvedWorkload, Resolver, StandardResolver};

/// Flowship - publish workload bundles to local, registry or object storage
#[derive(Parser)]
#[command(name = "flowship")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.flowship)
  #[arg(long, global = true, env = "FLOWSHIP_DATA_DIR")]
  data_dir: Option<PathBuf>,

  /// Docker Engine control socket
  #[arg(long, global = true, default_value = DEFAULT_DOCKER_SOCKET)]
  docker_socket: PathBuf,

  /// Give up on a publication or resolution after this many seconds
  #[arg(long, global = true)]
  deadline_secs: Option<u64>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Publish a workload described by a publication file
  Publish {
    /// Path to the publication file (JSON)
    publication_file: PathBuf,
  },

  /// Fetch the artifact of a deployment record
  Resolve {
    /// Deployment record id
    id: String,

    /// Directory to unpack object store artifacts into
    #[arg(long, default_value = ".")]
    dest: PathBuf,
  },

  /// Inspect deployment records
  Records {
    #[command(subcommand)]
    command: RecordsCommand,
  },

  /// List saved credential sets
  Credentials,
}

#[derive(Subcommand)]
enum RecordsCommand {
  /// List records, oldest first
  List {
    /// Only records of this workload
    #[arg(long)]
    workload: Option<String>,
  },

  /// Print one record as JSON
  Show { id: String },
}

/// Stores shared by every command, rooted in the data directory.
struct Stores {
  credentials: Arc<FsCredentialRegistry>,
  records: Arc<FsRecordStore>,
}

impl Stores {
  fn open(data_dir: &Path) -> Self {
    Self {
      credentials: Arc::new(FsCredentialRegistry::new(data_dir.join("credentials"))),
      records: Arc::new(FsRecordStore::new(data_dir.join("records"))),
    }
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::from_default_env().add_directive("flowship=info".parse()?),
    )
    .with_writer(std::io::stderr)
    .init();

  let data_dir = match cli.data_dir.clone() {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".flowship"),
  };

  let rt = tokio::runtime::Runtime::new()?;
  match &cli.command {
    Some(Commands::Publish { publication_file }) => {
      rt.block_on(publish(&cli, publication_file, &data_dir))
    }
    Some(Commands::Resolve { id, dest }) => rt.block_on(resolve(&cli, id, dest, &data_dir)),
    Some(Commands::Records { command }) => rt.block_on(records(command, &data_dir)),
    Some(Commands::Credentials) => rt.block_on(credentials(&data_dir)),
    None => {
      println!("flowship - use --help to see available commands");
      Ok(())
    }
  }
}

/// A context logging every event, bounded by `--deadline-secs` and cancelled
/// on Ctrl-C.
fn context(cli: &Cli) -> PublishContext {
  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      eprintln!("interrupted, cancelling");
      on_interrupt.cancel();
    }
  });

  let ctx = PublishContext::new()
    .with_observer(Arc::new(TracingObserver))
    .with_cancellation(cancel);
  match cli.deadline_secs {
    Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
    None => ctx,
  }
}

async fn publish(cli: &Cli, publication_file: &Path, data_dir: &Path) -> Result<()> {
  let content = tokio::fs::read_to_string(publication_file)
    .await
    .with_context(|| format!("failed to read publication file: {}", publication_file.display()))?;
  let def = PublicationDef::from_json(&content)
    .with_context(|| format!("failed to parse publication file: {}", publication_file.display()))?;

  let stores = Stores::open(data_dir);
  // Records outlive this process, so no native store is shared and `native`
  // object transport is rejected as a configuration error.
  let coordinator = PublicationCoordinator::builder(stores.credentials.clone())
    .transport(Arc::new(DockerTransport::new(&cli.docker_socket)))
    .records(stores.records.clone())
    .build();

  let record = coordinator
    .publish(&def.workload, &def.backend, &context(cli))
    .await
    .with_context(|| format!("failed to publish workload '{}'", def.workload.name))?;

  eprintln!("Published {} as {}", record.workload, record.id);
  println!("{}", serde_json::to_string_pretty(&record)?);
  Ok(())
}

async fn resolve(
  cli: &Cli,
  id: &str,
  dest: &Path,
  data_dir: &Path,
) -> Result<()> {
  let stores = Stores::open(data_dir);
  let record = stores
    .records
    .get(id)
    .await
    .with_context(|| format!("failed to load record {}", id))?;

  let resolver = StandardResolver::with_transport(
    stores.credentials.clone(),
    Arc::new(DockerTransport::new(&cli.docker_socket)),
  );
  let resolved = resolver
    .resolve(&record, dest, &context(cli))
    .await
    .with_context(|| format!("failed to resolve record {}", id))?;

  match resolved {
    ResolvedWorkload::Directory { path } => println!("{}", path.display()),
    ResolvedWorkload::Image { reference } => println!("{}", reference),
  }
  Ok(())
}

async fn records(command: &RecordsCommand, data_dir: &Path) -> Result<()> {
  let stores = Stores::open(data_dir);
  match command {
    RecordsCommand::List { workload } => {
      let records = match workload {
        Some(name) => stores.records.list_for_workload(name).await,
        None => stores.records.list().await,
      }
      .context("failed to list records")?;
      for record in records {
        println!(
          "{}\t{}\t{}\t{}",
          record.id, record.workload, record.backend, record.artifact
        );
      }
    }
    RecordsCommand::Show { id } => {
      let record = stores
        .records
        .get(id)
        .await
        .with_context(|| format!("failed to load record {}", id))?;
      println!("{}", serde_json::to_string_pretty(&record)?);
    }
  }
  Ok(())
}

async fn credentials(data_dir: &Path) -> Result<()> {
  let stores = Stores::open(data_dir);
  let names = stores
    .credentials
    .list()
    .await
    .context("failed to list credential sets")?;
  for name in names {
    println!("{}", name);
  }
  Ok(())
}
