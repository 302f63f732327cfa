//! Command line front end for the document core.
//!
//! # Responsibility
//! - Map subcommands onto `DocumentService` operations for one acting user.
//! - Load configuration from a JSON file, environment and flags.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dokuti_core::{
    init_logging, open_db, ContentUpload, CoreConfig, DocumentListQuery, DocumentPermission,
    DocumentService, FsContentStore, PageRequest, SortDirection, SortField,
    SqliteDocumentRepository,
};
use log::info;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

type Service<'conn> = DocumentService<SqliteDocumentRepository<'conn>, FsContentStore>;

/// dokuti - versioned document store
#[derive(Parser, Debug)]
#[command(name = "dokuti")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON config file; environment and flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite metadata database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Content store root directory
    #[arg(long, global = true)]
    content_root: Option<PathBuf>,

    /// Absolute log directory; file logging is off when unset
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Acting user id
    #[arg(short, long, env = "DOKUTI_USER", global = true)]
    user: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check core linkage
    Ping,

    /// Store a file as a new document
    Put {
        file: PathBuf,

        /// Document name; defaults to the file name
        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Record a change, optionally uploading new content
    Update {
        document: Uuid,

        /// New content for the document
        file: Option<PathBuf>,

        /// Rename the document along with the new content
        #[arg(long, requires = "file")]
        name: Option<String>,
    },

    /// Write verified document content to stdout or a file
    Cat {
        document: Uuid,

        /// Specific version; defaults to the latest
        #[arg(long)]
        version: Option<Uuid>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List readable documents
    #[command(alias = "list")]
    Ls {
        /// Case-insensitive name substring
        #[arg(long, default_value = "")]
        name: String,

        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long = "attribute")]
        attributes: Vec<String>,

        #[arg(long = "group")]
        groups: Vec<String>,

        #[arg(long, default_value = "0")]
        page: u32,

        #[arg(long)]
        size: Option<u32>,

        #[arg(long, value_enum, default_value = "updated")]
        sort: SortArg,

        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
    },

    /// Show version history, newest first
    Versions { document: Uuid },

    /// Add tags to a document
    Tag {
        document: Uuid,
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Grant a permission to another user
    Grant {
        document: Uuid,
        subject: Uuid,
        #[arg(value_enum)]
        permission: PermissionArg,
    },

    /// Revoke a permission from a user
    Revoke {
        document: Uuid,
        subject: Uuid,
        #[arg(value_enum)]
        permission: PermissionArg,
    },

    /// Remove stored content no version references
    Sweep {
        /// Skip content and staged writes modified within this many seconds
        #[arg(long, default_value = "3600")]
        min_age_secs: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Name,
    Updated,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PermissionArg {
    Read,
    Write,
    Delete,
    Share,
    Admin,
}

impl From<PermissionArg> for DocumentPermission {
    fn from(value: PermissionArg) -> Self {
        match value {
            PermissionArg::Read => Self::Read,
            PermissionArg::Write => Self::Write,
            PermissionArg::Delete => Self::Delete,
            PermissionArg::Share => Self::Share,
            PermissionArg::Admin => Self::Admin,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Ping) {
        println!("dokuti_core ping={}", dokuti_core::ping());
        println!("dokuti_core version={}", dokuti_core::core_version());
        return Ok(());
    }

    let config = load_config(&cli)?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir).map_err(|err| anyhow!("{err}"))?;
    }

    let conn = open_db(&config.database_path).with_context(|| {
        format!(
            "failed to open database `{}`",
            config.database_path.display()
        )
    })?;
    let repo = SqliteDocumentRepository::try_new(&conn)?;
    let store = FsContentStore::open(&config.content_root).with_context(|| {
        format!(
            "failed to open content store `{}`",
            config.content_root.display()
        )
    })?;
    let service = DocumentService::new(repo, store);

    run(&service, cli.user, cli.command)
}

fn load_config(cli: &Cli) -> Result<CoreConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config `{}`", path.display()))?;
            let mut config = CoreConfig::from_json_str(&raw)?;
            config.apply_env()?;
            config
        }
        None => CoreConfig::from_env()?,
    };

    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    if let Some(root) = &cli.content_root {
        config.content_root = root.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = Some(dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run(service: &Service<'_>, user: Option<Uuid>, command: Commands) -> Result<()> {
    let acting_user = || user.context("an acting user is required: pass --user or set DOKUTI_USER");

    match command {
        Commands::Ping => {}
        Commands::Put {
            file,
            name,
            content_type,
            description,
        } => {
            let user = acting_user()?;
            let content = std::fs::read(&file)
                .with_context(|| format!("failed to read `{}`", file.display()))?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|value| value.to_string_lossy().into_owned())
                    .context("cannot derive a document name from the path; pass --name")?,
            };
            let document =
                service.create_document(user, &content, &name, &content_type, &description)?;
            println!("{}", document.id);
        }
        Commands::Update {
            document,
            file,
            name,
        } => {
            let user = acting_user()?;
            let current = service.find_document(document, user)?;
            let content = file
                .as_ref()
                .map(|path| {
                    std::fs::read(path)
                        .with_context(|| format!("failed to read `{}`", path.display()))
                })
                .transpose()?;
            let file_name = name.or_else(|| {
                file.as_ref()
                    .and_then(|path| path.file_name())
                    .map(|value| value.to_string_lossy().into_owned())
            });
            let upload = content.as_deref().map(|content| ContentUpload {
                content,
                file_name: file_name.as_deref(),
            });
            let updated = service.update_document(user, &current, upload)?;
            println!(
                "{} {}",
                updated.id,
                updated
                    .latest_version_id
                    .map(|id| id.to_string())
                    .unwrap_or_default()
            );
        }
        Commands::Cat {
            document,
            version,
            output,
        } => {
            let user = acting_user()?;
            let document = service.find_document(document, user)?;
            let content = match version {
                Some(version_id) => {
                    let version = service.find_version(&document, version_id, user)?;
                    service.read_version(&document, &version, user)?
                }
                None => service.read_latest(&document, user)?,
            };
            match output {
                Some(path) => std::fs::write(&path, &content)
                    .with_context(|| format!("failed to write `{}`", path.display()))?,
                None => std::io::stdout()
                    .lock()
                    .write_all(&content)
                    .context("failed to write content to stdout")?,
            }
        }
        Commands::Ls {
            name,
            tags,
            attributes,
            groups,
            page,
            size,
            sort,
            asc,
        } => {
            let user = acting_user()?;
            let field = match sort {
                SortArg::Name => SortField::Name,
                SortArg::Updated => SortField::UpdatedAt,
            };
            let direction = if asc {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            };
            let request = PageRequest {
                page,
                size,
                ..PageRequest::default()
            }
            .sorted_by(field, direction);
            let query = DocumentListQuery {
                name,
                tags,
                attribute_names: attributes,
                group_names: groups,
            };

            let result = service.list_visible(user, &request, &query)?;
            for document in &result.items {
                println!(
                    "{}\t{}\t{}\t{}",
                    document.id,
                    document.updated_at,
                    document.name,
                    document.tags.join(",")
                );
            }
            println!(
                "page {}/{} ({} documents)",
                result.page + 1,
                result.total_pages().max(1),
                result.total_elements
            );
        }
        Commands::Versions { document } => {
            let user = acting_user()?;
            let document = service.find_document(document, user)?;
            for version in service.list_versions(&document, user)? {
                let marker = if Some(version.id) == document.latest_version_id {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {}\t{}\t{}:{}\t{}",
                    version.id,
                    version.created_at,
                    version.checksum_algorithm,
                    version.checksum,
                    version.created_by
                );
            }
        }
        Commands::Tag { document, tags } => {
            let user = acting_user()?;
            let document = service.find_document(document, user)?;
            let tagged = service.add_tags(&document, &tags, user)?;
            println!("{}", tagged.tags.join(","));
        }
        Commands::Grant {
            document,
            subject,
            permission,
        } => {
            let user = acting_user()?;
            let document = service.find_document(document, user)?;
            let entry = service.grant_permission(&document, subject, permission.into(), user)?;
            println!("granted {} to {}", entry.permission.as_str(), entry.user_id);
        }
        Commands::Revoke {
            document,
            subject,
            permission,
        } => {
            let user = acting_user()?;
            let document = service.find_document(document, user)?;
            let entry = service.revoke_permission(&document, subject, permission.into(), user)?;
            println!("revoked {} from {}", entry.permission.as_str(), entry.user_id);
        }
        Commands::Sweep { min_age_secs } => {
            let min_age = Duration::from_secs(min_age_secs);
            let swept = service
                .content_store()
                .sweep_partials(min_age)
                .context("failed to sweep partial writes")?;
            let report = service.sweep_orphaned_content(min_age)?;
            info!(
                "event=cli_sweep module=cli status=ok partials={swept} removed={}",
                report.removed
            );
            println!(
                "examined={} removed={} skipped_recent={} partials={swept}",
                report.examined, report.removed, report.skipped_recent
            );
        }
    }

    Ok(())
}
