//! # docvault CLI
//!
//! The `docvault` binary resolves document identifiers, computes archive
//! digests, stores and deletes archives, and maintains the archive index.
//!
//! ## Usage
//!
//! ```bash
//! docvault --config ./config/docvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docvault init` | Create the index database and schema |
//! | `docvault id db <id>` | Print the database of an identifier |
//! | `docvault id locate <id>` | Print where a document is stored |
//! | `docvault id fetch <id>` | Write a document's bytes (local, then remote) |
//! | `docvault digest compute <files...>` | Digest files with a manifest and system |
//! | `docvault digest location <digest>` | Print the archive path of a digest |
//! | `docvault digest manifest <digest>` | Print (or `--set` and re-index) an archive's manifest |
//! | `docvault digest harvest <code>` | Extract one file from an archive |
//! | `docvault digest delete <digest>` | Remove an archive and its index entries |
//! | `docvault archive store --doc <id>...` | Build, write, and index an archive |
//! | `docvault archive inspect <digest>` | Show an archive's meta and stored files |
//! | `docvault index rebuild` | Rebuild the index from the archives on disk |
//! | `docvault index lookup <id>` | Print the digest of an identifier |
//! | `docvault index search <term>` | List entries by identifier or digest |
//!
//! Logging goes to stderr; raise the level with `-v`, `-vv`, `-vvv`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use docvault::config::{self, WorkersConfig};
use docvault::ingest::StoreRequest;
use docvault::progress::ProgressMode;
use docvault::{archive_cmd, digest_cmd, id_cmd, index_cmd, ingest, migrate};

/// docvault: content-addressable document locator, digest engine, and
/// archive index.
///
/// Most commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docvault",
    about = "docvault: content-addressable document locator, digest engine, and archive index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docvault.toml")]
    config: PathBuf,

    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Work with document identifiers.
    Id {
        #[command(subcommand)]
        action: IdAction,
    },

    /// Work with digests and the archives they name.
    Digest {
        #[command(subcommand)]
        action: DigestAction,
    },

    /// Create and inspect archives.
    Archive {
        #[command(subcommand)]
        action: ArchiveAction,
    },

    /// Maintain and query the archive index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum IdAction {
    /// Print the database an identifier points into.
    Db { id: String },

    /// Print the resolved path of a document.
    ///
    /// Tries the shadow database first when one is configured, then the
    /// primary location; accepts renamed files with an extra suffix.
    /// Exits with status 1 when nothing is found.
    Locate {
        id: String,

        /// Print `{"match": "exact"|"glob", "path": ...}` or `null`.
        #[arg(long)]
        json: bool,
    },

    /// Write a document's bytes to stdout or a file.
    ///
    /// Falls back to `[storage].remote_url` when the document is not
    /// stored locally.
    Fetch {
        id: String,

        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum DigestAction {
    /// Compute the digest of a set of files.
    Compute {
        /// Files to digest. Order does not matter.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// File holding the manifest text.
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// System label.
        #[arg(long, default_value = "")]
        system: String,

        #[arg(long)]
        json: bool,
    },

    /// Print the archive path of a digest.
    Location { digest: String },

    /// Print the manifest stored in an archive.
    Manifest {
        digest: String,

        /// Replace the manifest with the contents of this file and refresh
        /// the digest's index entries.
        #[arg(long)]
        set: Option<PathBuf>,
    },

    /// Extract a stored file. The code is a digest followed by the file name.
    Harvest {
        code: String,

        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Remove an archive and its index entries.
    Delete { digest: String },
}

#[derive(Subcommand)]
enum ArchiveAction {
    /// Read documents, digest them, write the archive, and index it.
    Store {
        /// Document identifier. Repeat for every document, in order.
        #[arg(long = "doc", required = true)]
        documents: Vec<String>,

        /// Index identifier. Repeat as needed; defaults to the documents.
        #[arg(long = "index")]
        indexes: Vec<String>,

        /// File holding the manifest text.
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// System label.
        #[arg(long, default_value = "")]
        system: String,

        #[arg(long)]
        json: bool,
    },

    /// Show an archive's meta row and stored files.
    Inspect {
        digest: String,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Rebuild the index from the archives under `[archive].root`.
    Rebuild {
        /// Progress on stderr. Defaults to human when stderr is a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print the digest an identifier maps to, or nothing.
    Lookup { id: String },

    /// List entries whose identifier or digest equals the term.
    Search {
        term: String,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Commands that don't require config
    match &cli.command {
        Commands::Id {
            action: IdAction::Db { id },
        } => {
            id_cmd::run_db(id)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Digest {
            action:
                DigestAction::Compute {
                    files,
                    manifest,
                    system,
                    json,
                },
        } => {
            // Use config if available for the worker count
            let cfg = config::load_config(&cli.config).ok();
            let max = cfg
                .map(|c| c.workers.max)
                .unwrap_or_else(|| WorkersConfig::default().max);
            digest_cmd::run_compute(max, files.clone(), manifest.as_deref(), system, *json)
                .await?;
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Index initialized successfully.");
        }
        Commands::Id { action } => match action {
            IdAction::Locate { id, json } => {
                if !id_cmd::run_locate(&cfg, &id, json).await? {
                    eprintln!("not found: {}", id);
                    return Ok(ExitCode::FAILURE);
                }
            }
            IdAction::Fetch { id, output } => {
                id_cmd::run_fetch(&cfg, &id, output.as_deref()).await?;
            }
            IdAction::Db { .. } => {
                // Handled above (before config loading)
                unreachable!()
            }
        },
        Commands::Digest { action } => match action {
            DigestAction::Location { digest } => {
                digest_cmd::run_location(&cfg, &digest)?;
            }
            DigestAction::Manifest { digest, set } => {
                digest_cmd::run_manifest(&cfg, &digest, set.as_deref()).await?;
            }
            DigestAction::Harvest { code, output } => {
                digest_cmd::run_harvest(&cfg, &code, output.as_deref()).await?;
            }
            DigestAction::Delete { digest } => {
                digest_cmd::run_delete(&cfg, &digest).await?;
            }
            DigestAction::Compute { .. } => {
                // Handled above (before config loading)
                unreachable!()
            }
        },
        Commands::Archive { action } => match action {
            ArchiveAction::Store {
                documents,
                indexes,
                manifest,
                system,
                json,
            } => {
                let manifest = match manifest {
                    Some(path) => digest_cmd::read_manifest(&path)?,
                    None => String::new(),
                };
                let request = StoreRequest {
                    documents,
                    indexes,
                    manifest,
                    system,
                };
                ingest::run_store(&cfg, &request, json).await?;
            }
            ArchiveAction::Inspect { digest, json } => {
                archive_cmd::run_inspect(&cfg, &digest, json).await?;
            }
        },
        Commands::Index { action } => match action {
            IndexAction::Rebuild { progress } => {
                let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
                index_cmd::run_rebuild(&cfg, mode).await?;
            }
            IndexAction::Lookup { id } => {
                index_cmd::run_lookup(&cfg, &id).await?;
            }
            IndexAction::Search { term, json } => {
                index_cmd::run_search(&cfg, &term, json).await?;
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
