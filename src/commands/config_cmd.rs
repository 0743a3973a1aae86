use clap::{Args, Subcommand};

use super::OutputFormat;
use loomsync::config::{Config, ConfigValue};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        print_value(
                            "database_path",
                            &config.database_path.value.display(),
                            &config.database_path,
                        );
                        print_value("api_url", &config.api_url.value, &config.api_url);
                        print_value("branch", &config.branch.value, &config.branch);
                        print_value(
                            "autosave_delay_ms",
                            &config.autosave_delay_ms.value,
                            &config.autosave_delay_ms,
                        );
                        print_value(
                            "content_dirs",
                            &config.content_dirs.value.join(", "),
                            &config.content_dirs,
                        );
                        print_value("assets_dir", &config.assets_dir.value, &config.assets_dir);
                        print_value(
                            "list_concurrency",
                            &config.list_concurrency.value,
                            &config.list_concurrency,
                        );
                        print_value(
                            "blob_concurrency",
                            &config.blob_concurrency.value,
                            &config.blob_concurrency,
                        );
                    }
                }
                Ok(())
            }
        }
    }
}

fn print_value<T>(name: &str, shown: &dyn std::fmt::Display, value: &ConfigValue<T>) {
    println!("{}: {}", name, shown);
    println!("  source: {}", value.source);
    println!();
}
