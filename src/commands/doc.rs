//! Document commands.

use chrono::Local;
use clap::{Args, Subcommand};
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::PathBuf;

use super::{connect, metadata_json, OutputFormat};
use loomsync::assets::guess_image_mime;
use loomsync::frontmatter::{self, default_page_metadata, default_post_metadata};
use loomsync::{Config, EditorSession, EngineError, LocalStore, RemoteError};

#[derive(Args)]
pub struct DocCommand {
    #[command(subcommand)]
    pub command: DocSubcommand,
}

#[derive(Subcommand)]
pub enum DocSubcommand {
    /// List documents in the content directories
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print a document, preferring its local draft
    Open {
        /// Repository path of the document
        path: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Edit a document and save the result as a draft
    Edit {
        /// Repository path of the document
        path: String,

        /// Replace the body with the contents of a file
        #[arg(long, value_name = "FILE")]
        body_file: Option<PathBuf>,

        /// Set a frontmatter field (can be repeated)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Remove a frontmatter field (can be repeated)
        #[arg(long = "unset", value_name = "KEY")]
        unset: Vec<String>,
    },

    /// Start a new document as a draft
    New {
        /// Repository path of the new document
        path: String,

        /// Use blog post defaults instead of page defaults
        #[arg(long)]
        post: bool,

        /// Document title
        #[arg(long)]
        title: Option<String>,
    },

    /// Publish a document with its draft and any images in one commit
    Publish {
        /// Repository path of the document
        path: String,

        /// Commit message (default: "Update <file name>")
        #[arg(long, short)]
        message: Option<String>,

        /// Local image to upload and append to the body (can be repeated)
        #[arg(long = "image", value_name = "FILE")]
        images: Vec<PathBuf>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a document from the repository
    Delete {
        /// Repository path of the document
        path: String,

        /// Commit message (default: "Delete <file name>")
        #[arg(long, short)]
        message: Option<String>,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl DocCommand {
    pub async fn run(
        &self,
        store: &LocalStore,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let engine = connect(config, store).await?;

        match &self.command {
            DocSubcommand::List { format } => {
                let documents = engine.list_documents().await;
                let drafts: HashSet<String> = engine.drafts().list().await?.into_iter().collect();

                match format {
                    OutputFormat::Json => {
                        let list: Vec<_> = documents
                            .iter()
                            .map(|d| {
                                serde_json::json!({
                                    "path": d.path,
                                    "version_token": d.version_token,
                                    "has_draft": drafts.contains(&d.path),
                                })
                            })
                            .collect();
                        println!("{}", serde_json::to_string_pretty(&list)?);
                    }
                    OutputFormat::Text => {
                        if documents.is_empty() {
                            println!("No documents found");
                            return Ok(());
                        }
                        for doc in &documents {
                            let marker = if drafts.contains(&doc.path) { "*" } else { " " };
                            println!("{} {}", marker, doc.path);
                        }
                        println!("\nTotal: {} document(s); * = unpublished draft", documents.len());
                    }
                }
                Ok(())
            }

            DocSubcommand::Open { path, format } => {
                let doc = engine.open_document(path).await?;

                match format {
                    OutputFormat::Json => {
                        let out = serde_json::json!({
                            "path": doc.path,
                            "from_draft": doc.from_draft,
                            "version_token": doc.version_token,
                            "metadata": metadata_json(&doc.metadata),
                            "body": doc.body,
                        });
                        println!("{}", serde_json::to_string_pretty(&out)?);
                    }
                    OutputFormat::Text => {
                        if doc.from_draft {
                            eprintln!("(showing unpublished draft)");
                        }
                        print!("{}", frontmatter::serialize_document(&doc.metadata, &doc.body));
                    }
                }
                Ok(())
            }

            DocSubcommand::Edit {
                path,
                body_file,
                set,
                unset,
            } => {
                if body_file.is_none() && set.is_empty() && unset.is_empty() {
                    return Err("Nothing to change. Use --body-file, --set or --unset.".into());
                }

                let mut editor = EditorSession::open(engine.clone(), path).await?;

                if let Some(file) = body_file {
                    editor.set_body(std::fs::read_to_string(file)?)?;
                }
                for assignment in set {
                    let (key, value) = assignment
                        .split_once('=')
                        .ok_or_else(|| format!("Expected KEY=VALUE, got '{}'", assignment))?;
                    editor.set_field(key.trim(), frontmatter::parse_value(value.trim()))?;
                }
                for key in unset {
                    if editor.remove_field(key)?.is_none() {
                        eprintln!("Field '{}' was not set", key);
                    }
                }

                editor.save_now().await?;
                editor.close();
                println!("Draft saved for {}", path);
                Ok(())
            }

            DocSubcommand::New { path, post, title } => {
                if engine.drafts().load(path).await?.is_some() {
                    return Err(format!("A draft for {} already exists", path).into());
                }
                match engine.fetch_version_token(path).await {
                    Ok(_) => return Err(format!("{} already exists in the repository", path).into()),
                    Err(EngineError::Remote(RemoteError::NotFound(_))) => {}
                    Err(e) => return Err(e.into()),
                }

                let mut metadata = if *post {
                    default_post_metadata(Local::now().date_naive())
                } else {
                    default_page_metadata()
                };
                if let Some(title) = title {
                    metadata.insert("title", title.as_str());
                }

                engine.save_draft(path, "", &metadata).await?;
                println!("Created draft for {}", path);
                Ok(())
            }

            DocSubcommand::Publish {
                path,
                message,
                images,
                format,
            } => {
                let mut editor = EditorSession::open(engine.clone(), path).await?;

                for image in images {
                    let name = image
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let mime = guess_image_mime(&name)
                        .ok_or_else(|| format!("Not an image file: {}", image.display()))?;
                    let bytes = std::fs::read(image)?;
                    let repo_path = editor.stage_image(&name, mime, &bytes)?;
                    eprintln!("Staged {} as {}", image.display(), repo_path);
                }
                if let Some(message) = message {
                    editor.set_commit_message(message.as_str());
                }

                let result = editor.publish().await?;
                editor.close();

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                    }
                    OutputFormat::Text => {
                        println!("Published {}", path);
                        println!("Commit: {}", result.commit_id);
                        println!("{}", result.url);
                    }
                }
                Ok(())
            }

            DocSubcommand::Delete {
                path,
                message,
                force,
            } => {
                // Confirm deletion unless --force is used
                if !force {
                    print!("Delete '{}' from the repository? [y/N] ", path);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                let message = message.clone().unwrap_or_else(|| {
                    let file_name = path.rsplit('/').next().unwrap_or(path);
                    format!("Delete {}", file_name)
                });
                engine.delete_document(path, &message).await?;
                println!("Deleted {}", path);
                Ok(())
            }
        }
    }
}
