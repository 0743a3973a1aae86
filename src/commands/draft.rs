use clap::{Args, Subcommand};

use super::{metadata_json, OutputFormat};
use loomsync::LocalStore;

/// Local draft commands. These never touch the remote.
#[derive(Args)]
pub struct DraftCommand {
    #[command(subcommand)]
    pub command: DraftSubcommand,
}

#[derive(Subcommand)]
pub enum DraftSubcommand {
    /// List unpublished drafts
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Throw away the draft of a document
    Discard {
        /// Repository path of the document
        path: String,
    },
}

impl DraftCommand {
    pub async fn run(&self, store: &LocalStore) -> Result<(), Box<dyn std::error::Error>> {
        let drafts = store.drafts();

        match &self.command {
            DraftSubcommand::List { format } => {
                let mut loaded = Vec::new();
                for path in drafts.list().await? {
                    if let Some(draft) = drafts.load(&path).await? {
                        loaded.push(draft);
                    }
                }

                match format {
                    OutputFormat::Json => {
                        let list: Vec<_> = loaded
                            .iter()
                            .map(|d| {
                                serde_json::json!({
                                    "path": d.path,
                                    "saved_at": d.saved_at.to_rfc3339(),
                                    "metadata": metadata_json(&d.metadata),
                                })
                            })
                            .collect();
                        println!("{}", serde_json::to_string_pretty(&list)?);
                    }
                    OutputFormat::Text => {
                        if loaded.is_empty() {
                            println!("No drafts");
                            return Ok(());
                        }
                        println!("{:<20}  PATH", "SAVED");
                        println!("{}", "-".repeat(60));
                        for draft in &loaded {
                            println!(
                                "{:<20}  {}",
                                draft.saved_at.format("%Y-%m-%d %H:%M:%S"),
                                draft.path
                            );
                        }
                        println!("\nTotal: {} draft(s)", loaded.len());
                    }
                }
                Ok(())
            }

            DraftSubcommand::Discard { path } => {
                if drafts.load(path).await?.is_none() {
                    return Err(format!("No draft for {}", path).into());
                }
                drafts.clear(path).await?;
                println!("Discarded draft for {}", path);
                Ok(())
            }
        }
    }
}
