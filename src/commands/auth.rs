//! Sign-in commands.

use clap::{Args, Subcommand};
use std::io::{self, Write};

use super::OutputFormat;
use loomsync::{Config, GitHubStore, LocalStore, RepoAddress, Session};

/// Authentication commands
#[derive(Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand)]
enum AuthSubcommand {
    /// Sign in to a repository with an access token
    Login {
        /// Repository as owner/repo or a repository URL
        repo: String,

        /// Access token (prompted for if omitted)
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget the stored token
    Logout,
    /// Show sign-in status
    Status {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl AuthCommand {
    pub async fn run(
        &self,
        store: &LocalStore,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::new(store.credentials());

        match &self.command {
            AuthSubcommand::Login { repo, token } => {
                let token = match token {
                    Some(token) => token.clone(),
                    None => prompt_token()?,
                };

                let address = RepoAddress::resolve(repo)?;
                let probe = GitHubStore::new(config.api_url.value.clone(), address, token.clone());
                let credential = session.login(&probe, repo, &token).await?;

                println!("Signed in to {}", credential.address());
                Ok(())
            }

            AuthSubcommand::Logout => {
                session.logout().await?;
                println!("Signed out.");
                Ok(())
            }

            AuthSubcommand::Status { format } => {
                let credential = session.restore().await?;
                let drafts = store.drafts().list().await?;

                match format {
                    OutputFormat::Json => {
                        let status = serde_json::json!({
                            "signed_in": credential.is_some(),
                            "repository": credential.as_ref().map(|c| c.address().to_string()),
                            "api_url": config.api_url.value,
                            "drafts": drafts.len(),
                        });
                        println!("{}", serde_json::to_string_pretty(&status)?);
                    }
                    OutputFormat::Text => {
                        match &credential {
                            Some(c) => println!("Signed in to {}", c.address()),
                            None => println!("Not signed in"),
                        }
                        println!("API: {}", config.api_url.value);
                        println!("Unpublished drafts: {}", drafts.len());
                    }
                }
                Ok(())
            }
        }
    }
}

fn prompt_token() -> Result<String, io::Error> {
    print!("Enter access token: ");
    io::stdout().flush()?;

    let mut token = String::new();
    io::stdin().read_line(&mut token)?;
    let token = token.trim().to_string();

    if token.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Token cannot be empty",
        ));
    }
    Ok(token)
}
