use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create global config instead of project config"
        )]
        global: bool,
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show {
        #[arg(long, help = "Show which files were merged")]
        source: bool,
    },
    #[command(about = "Show configuration file paths")]
    Path {
        #[arg(long, help = "Show all possible config paths")]
        all: bool,
    },
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, formatter.as_ref()),
        ConfigCommand::Show { source } => handle_show(source, format),
        ConfigCommand::Path { all } => handle_path(all),
    }
}

fn handle_init(global: bool, force: bool, formatter: &dyn Formatter) -> Result<()> {
    if global {
        let config_path = Config::global_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

        if config_path.exists() && !force {
            anyhow::bail!(
                "Global config already exists at: {}\nUse --force to overwrite.",
                config_path.display()
            );
        }

        let path = Config::init_global().context("failed to create global config")?;
        print!(
            "{}",
            formatter.format_message(&format!("Created global config at: {}", path.display()))
        );
    } else {
        let config_dir = Config::project_config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine project directory"))?;
        let config_path = config_dir.join("config.toml");

        if config_path.exists() && !force {
            anyhow::bail!(
                "Project config already exists at: {}\nUse --force to overwrite.",
                config_path.display()
            );
        }

        let path = Config::init_project().context("failed to create project config")?;
        print!(
            "{}",
            formatter.format_message(&format!("Created project config at: {}", path.display()))
        );
    }

    Ok(())
}

fn handle_show(show_source: bool, format: OutputFormat) -> Result<()> {
    let resolved = Config::load()?;
    let config = resolved.config.redacted();

    if format == OutputFormat::Json {
        if show_source {
            let output = serde_json::json!({
                "config": config,
                "project_path": resolved.project_path,
                "global_path": resolved.global_path,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        return Ok(());
    }

    if show_source {
        match resolved.project_path {
            Some(ref path) => println!("# Project config: {}", path.display()),
            None => println!("# Project config: (none)"),
        }
        match resolved.global_path {
            Some(ref path) => println!("# Global config: {}", path.display()),
            None => println!("# Global config: (none)"),
        }
        println!("# Environment: ROWVEC_* variables and .env applied last");
        println!();
    }

    print!(
        "{}",
        toml::to_string_pretty(&config).context("failed to render configuration")?
    );

    Ok(())
}

fn handle_path(show_all: bool) -> Result<()> {
    let project_path = Config::find_project_config();
    let global_path = Config::global_path();

    println!("Configuration paths:");
    println!();

    if let Some(ref path) = project_path {
        println!("Project config (active): {}", path.display());
    } else if show_all && let Some(dir) = Config::project_config_dir() {
        println!(
            "Project config (would be): {}",
            dir.join("config.toml").display()
        );
    }

    if let Some(ref path) = global_path {
        if path.exists() {
            println!("Global config (active): {}", path.display());
        } else if show_all {
            println!("Global config (would be): {}", path.display());
        }
    }

    if show_all && let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        if env_path.exists() {
            println!(".env file (active): {}", env_path.display());
        } else {
            println!(".env file (would be): {}", env_path.display());
        }
    }

    Ok(())
}
