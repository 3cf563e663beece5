use anyhow::{Context, Result};
use clap::Args;
use entidesc::{DdlOptions, EntityDescriptor, MySqlAdapter, SchemaResult, SqlAdapter, incremental_changes};

use crate::context::ProjectContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Apply Changes",
        commands: &[
            "entidesc upgrade                  # Show pending SQL and ask before running it",
            "entidesc upgrade --yes            # Apply without asking",
        ],
    },
    ExampleGroup {
        title: "Preview",
        commands: &["entidesc upgrade --dry-run        # Print the SQL, execute nothing"],
    },
];

#[derive(Args)]
pub struct UpgradeArgs {
    /// Apply the changes without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print the pending SQL without executing it
    #[arg(long, conflicts_with = "yes")]
    pub dry_run: bool,
}

pub async fn handle_upgrade(args: UpgradeArgs, output: &OutputManager) -> Result<()> {
    let ctx = ProjectContext::find()?;

    if !ctx.is_initialized() {
        output.error("entidesc is not initialized in this project.");
        output.info("Run 'entidesc init' first to initialize.");
        anyhow::bail!("Project not initialized");
    }

    let descriptors = ctx.loader().load_all().context("Failed to load entity descriptors")?;
    if descriptors.is_empty() {
        output.warning(&format!("No entity declared in {}", ctx.entities_dir.display()));
        return Ok(());
    }

    let url = ctx.database_url()?;
    output.progress("Connecting to MySQL");
    let adapter = MySqlAdapter::connect(&url).await.context("Failed to connect to MySQL");
    output.clear_line();
    let adapter = adapter?;

    let statements = pending_changes(&descriptors, &adapter, &ctx.ddl_options(), output).await?;
    if statements.is_empty() {
        output.success("No changes");
        return Ok(());
    }

    let batch = statements.join("\n\n");
    output.sql(&batch);
    println!();

    if args.dry_run {
        output.info("Dry run, nothing was executed.");
        return Ok(());
    }

    if !args.yes {
        let answer = output.prompt("Do you want to apply changes ? [Y/n] ")?;
        if !confirmation_accepted(&answer) {
            output.warning("Aborting changes");
            return Ok(());
        }
    }

    adapter.execute(&batch).await.context("Failed to apply changes")?;
    output.success("All changes were applied.");
    Ok(())
}

/// SQL of every concrete entity whose table differs, in entity order.
pub async fn pending_changes<A: SqlAdapter>(
    descriptors: &[EntityDescriptor],
    adapter: &A,
    options: &DdlOptions,
    output: &OutputManager,
) -> SchemaResult<Vec<String>> {
    let mut statements = Vec::new();
    for descriptor in descriptors.iter().filter(|d| !d.is_abstract) {
        match incremental_changes(descriptor, adapter, options).await? {
            Some(sql) => {
                output.verbose(&format!("{}: changes pending", descriptor.table()));
                statements.push(sql);
            }
            None => output.verbose(&format!("{}: up to date", descriptor.table())),
        }
    }
    Ok(statements)
}

/// An empty answer accepts, as does `y` in any case.
pub fn confirmation_accepted(answer: &str) -> bool {
    let answer = answer.trim();
    answer.is_empty() || answer.eq_ignore_ascii_case("y")
}
