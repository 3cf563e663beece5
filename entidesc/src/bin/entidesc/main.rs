mod commands;
mod context;
mod examples;
mod output;
mod theme;

use anyhow::Result;
use clap::{Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::fmt::Write;

use commands::{
    cache::{CacheCommands, handle_cache_commands},
    init::{InitArgs, handle_init},
    schema::{SchemaCommands, handle_schema_commands},
    upgrade::{UpgradeArgs, handle_upgrade},
};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("DATABASE_URL", "MySQL connection URL used by the default configuration"),
    ("RUST_LOG", "Log filter, 'entidesc=debug' traces every planned change"),
];

#[derive(Parser)]
#[command(name = "entidesc")]
#[command(version = "0.1.0")]
#[command(
    about = "Entity descriptors and incremental MySQL migrations",
    long_about = r#"Entity descriptor and migration CLI that provides:

• Entity declarations in plain TOML files, with parent inheritance
• Column and index mapping for MySQL
• Incremental ALTER TABLE generation against the live schema
• Confirmation before anything is executed"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

/// The clap command with every subcommand's examples and the environment appendix attached.
fn cli_command() -> Command {
    let mut command = Cli::command().after_long_help(environment_appendix());
    for example in command_examples() {
        command = command.mut_subcommand(example.name, |subcommand| {
            subcommand.after_long_help(render_examples(example.groups))
        });
    }
    command
}

fn render_examples(groups: &[ExampleGroup]) -> String {
    let mut buffer = String::from("Examples:\n");
    for (index, group) in groups.iter().enumerate() {
        if index > 0 {
            buffer.push('\n');
        }
        let _ = writeln!(buffer, "  {}", group.title);
        for command in group.commands {
            let _ = writeln!(buffer, "    {command}");
        }
    }
    buffer
}

fn environment_appendix() -> String {
    let mut buffer = String::from("Environment Variables:\n");
    for (key, description) in ENVIRONMENT_VARIABLES {
        let _ = writeln!(buffer, "  {key:<14}{description}");
    }
    buffer.push_str("\nUse 'entidesc <command> --help' to view examples for each command.\n");
    buffer
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize entidesc in the current project
    Init(InitArgs),

    /// Apply pending schema changes of every entity
    Upgrade(UpgradeArgs),

    /// Inspect entity descriptors and the SQL they map to
    #[command(subcommand)]
    Schema(SchemaCommands),

    /// Manage the descriptor cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let matches = cli_command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    if let Err(err) = execute(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let global_options = GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    };

    if global_options.no_color {
        colored::control::set_override(false);
    }

    let output = OutputManager::new(global_options);

    match cli.command {
        Commands::Init(args) => {
            handle_init(args, &output).await?;
        }
        Commands::Upgrade(args) => {
            handle_upgrade(args, &output).await?;
        }
        Commands::Schema(schema_cmd) => {
            handle_schema_commands(schema_cmd, &output).await?;
        }
        Commands::Cache(cache_cmd) => {
            handle_cache_commands(cache_cmd, &output)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        cli_command().debug_assert();
    }

    #[test]
    fn test_every_command_has_examples() {
        let command = cli_command();
        for example in command_examples() {
            let subcommand = command.find_subcommand(example.name).unwrap();
            let help = subcommand.get_after_long_help().unwrap().to_string();
            assert!(help.starts_with("Examples:\n"), "{}", example.name);
            assert!(help.contains(&format!("entidesc {}", example.name)), "{}", example.name);
        }
        let appendix = command.get_after_long_help().unwrap().to_string();
        assert!(appendix.contains("DATABASE_URL"));
    }

    #[test]
    fn test_global_flags_before_subcommand() {
        let matches = cli_command()
            .try_get_matches_from(["entidesc", "--output", "json", "-q", "upgrade", "--dry-run"])
            .unwrap();
        let cli = Cli::from_arg_matches(&matches).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Upgrade(UpgradeArgs { dry_run: true, yes: false })));
    }

    #[test]
    fn test_dry_run_conflicts_with_yes() {
        let result = cli_command().try_get_matches_from(["entidesc", "upgrade", "--yes", "--dry-run"]);
        assert!(result.is_err());
    }
}
