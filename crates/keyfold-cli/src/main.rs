//! keyfold command-line driver.
//!
//! Runs one service operation against the configured stores and prints the
//! result as JSON:
//! ```bash
//! keyfold --owner u1 upload ./notes.txt --dir docs%
//! keyfold --owner u1 ls docs%
//! RUST_LOG=keyfold_kernel=debug keyfold --owner u1 rmdir docs%
//! ```
//!
//! Directory arguments use the transport form, `%` in place of `/`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use keyfold_kernel::path::decode;
use keyfold_kernel::{KernelConfig, ListOptions, Vfs};
use keyfold_types::{InvalidOwnerId, OwnerId, SortSpec};
use serde_json::{Value, json};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "keyfold")]
#[command(version, about = "Per-owner folders on a flat object store", long_about = None)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/keyfold/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Owner whose files are addressed
    #[arg(short, long, global = true, value_parser = parse_owner)]
    owner: Option<OwnerId>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Upload a local file
    Upload {
        #[arg(value_name = "LOCAL_PATH")]
        local_path: PathBuf,

        /// Target directory
        #[arg(short, long, default_value = "")]
        dir: String,

        /// Stored file name (default: the local file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List the files in a directory
    Ls {
        #[arg(default_value = "")]
        dir: String,
    },

    /// List the folders in a directory
    Folders {
        #[arg(default_value = "")]
        dir: String,
    },

    /// Create an empty folder
    Mkdir {
        name: String,

        #[arg(short, long, default_value = "")]
        dir: String,
    },

    /// Delete a file, or an empty folder when ENTRY ends in `/` (or `%`)
    Rm {
        entry: String,

        #[arg(short, long, default_value = "")]
        dir: String,
    },

    /// Delete a directory and everything under it
    Rmdir { dir: String },

    /// Print the locator of a stored file
    Link {
        name: String,

        #[arg(short, long, default_value = "")]
        dir: String,
    },

    /// List every file of the owner
    Me {
        /// e.g. `createdAt:desc`, `filename:asc`
        #[arg(long)]
        sort: Option<SortSpec>,

        /// 0 means no limit
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, default_value_t = 0)]
        skip: usize,
    },

    /// Report objects without records and records without objects
    Orphans,

    /// Delete every object and record of the owner
    PurgeOwner,
}

fn parse_owner(raw: &str) -> Result<OwnerId, InvalidOwnerId> {
    OwnerId::new(raw)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON. Respects RUST_LOG.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = KernelConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let vfs = Vfs::open(&config).context("Failed to open stores")?;
    let owner = cli.owner.context("--owner is required")?;

    let output = execute(&vfs, &owner, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn execute(vfs: &Vfs, owner: &OwnerId, command: Command) -> Result<Value> {
    tracing::debug!(owner = %owner, ?command, "executing");
    let value = match command {
        Command::Upload {
            local_path,
            dir,
            name,
        } => {
            let name = match name {
                Some(name) => name,
                None => local_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .with_context(|| format!("no file name in {}", local_path.display()))?,
            };
            let data = tokio::fs::read(&local_path)
                .await
                .with_context(|| format!("reading {}", local_path.display()))?;
            let record = vfs
                .upload(owner, &decode(&dir), &name, Bytes::from(data))
                .await
                .context("upload failed")?;
            serde_json::to_value(record)?
        }
        Command::Ls { dir } => json!(vfs.list_files(owner, &decode(&dir)).await?),
        Command::Folders { dir } => json!(vfs.list_folders(owner, &decode(&dir)).await?),
        Command::Mkdir { name, dir } => {
            json!({ "created": vfs.create_folder(owner, &decode(&dir), &name).await? })
        }
        Command::Rm { entry, dir } => {
            serde_json::to_value(vfs.delete_entry(owner, &decode(&dir), &decode(&entry)).await?)?
        }
        Command::Rmdir { dir } => {
            let report = vfs.empty_directory(owner, &decode(&dir)).await?;
            if !report.is_clean() {
                tracing::warn!(directory = %report.directory, "sweep was partial");
            }
            serde_json::to_value(report)?
        }
        Command::Link { name, dir } => {
            json!({ "url": vfs.file_link(owner, &decode(&dir), &name).await? })
        }
        Command::Me { sort, limit, skip } => {
            let options = ListOptions { sort, limit, skip };
            serde_json::to_value(vfs.list_owner_files(owner, &options).await?)?
        }
        Command::Orphans => serde_json::to_value(vfs.find_orphans(owner).await?)?,
        Command::PurgeOwner => serde_json::to_value(vfs.remove_owner(owner).await?)?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfold_kernel::{ErrorKind, SortField, VfsError};
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("keyfold").chain(args.iter().copied())).unwrap()
    }

    #[rstest]
    #[case::ls_default(&["ls"], Command::Ls { dir: String::new() })]
    #[case::ls_transport(&["ls", "test1%test1-1%"], Command::Ls { dir: "test1%test1-1%".into() })]
    #[case::rm_folder(&["rm", "sub/", "-d", "docs%"], Command::Rm { entry: "sub/".into(), dir: "docs%".into() })]
    #[case::purge(&["purge-owner"], Command::PurgeOwner)]
    fn parses_subcommands(#[case] args: &[&str], #[case] expected: Command) {
        assert_eq!(parse(args).command, expected);
    }

    #[test]
    fn parses_global_owner_after_subcommand() {
        let cli = parse(&["me", "--sort", "createdAt:desc", "--limit", "5", "--owner", "u1"]);
        assert_eq!(cli.owner.unwrap().as_str(), "u1");
        assert_eq!(
            cli.command,
            Command::Me {
                sort: Some(SortSpec::desc(SortField::CreatedAt)),
                limit: Some(5),
                skip: 0,
            }
        );
    }

    #[test]
    fn rejects_bad_owner_and_sort() {
        let bad_owner = Cli::try_parse_from(["keyfold", "--owner", "a/b", "ls"]);
        assert!(bad_owner.is_err());
        let bad_sort = Cli::try_parse_from(["keyfold", "me", "--sort", "size:desc"]);
        assert!(bad_sort.is_err());
    }

    #[tokio::test]
    async fn upload_then_list_through_transport_paths() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("notes.txt");
        std::fs::write(&local, b"remember").unwrap();

        let vfs = Vfs::transient();
        let owner = OwnerId::new("u1").unwrap();
        let record = execute(
            &vfs,
            &owner,
            Command::Upload {
                local_path: local,
                dir: "docs%2024%".into(),
                name: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(record["directory"], "docs/2024/");
        assert_eq!(record["filename"], "notes.txt");
        assert_eq!(record["size"], 8);

        let files = execute(&vfs, &owner, Command::Ls { dir: "docs%2024".into() })
            .await
            .unwrap();
        assert_eq!(files, json!(["notes.txt"]));
    }

    #[rstest]
    #[case::transport("sub%")]
    #[case::plain("sub/")]
    #[tokio::test]
    async fn rm_folder_entry_in_either_form(#[case] entry: &str) {
        let vfs = Vfs::transient();
        let owner = OwnerId::new("u1").unwrap();
        execute(
            &vfs,
            &owner,
            Command::Mkdir {
                name: "sub".into(),
                dir: "docs%".into(),
            },
        )
        .await
        .unwrap();

        let deleted = execute(
            &vfs,
            &owner,
            Command::Rm {
                entry: entry.into(),
                dir: "docs%".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(deleted["path"], "docs/sub/");

        let err = execute(&vfs, &owner, Command::Folders { dir: "docs%".into() })
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<VfsError>().unwrap().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn service_errors_keep_their_kind() {
        let vfs = Vfs::transient();
        let owner = OwnerId::new("u1").unwrap();
        let err = execute(&vfs, &owner, Command::Folders { dir: "missing%".into() })
            .await
            .unwrap_err();
        let vfs_err = err.downcast_ref::<VfsError>().unwrap();
        assert_eq!(vfs_err.kind(), ErrorKind::NotFound);
    }
}
