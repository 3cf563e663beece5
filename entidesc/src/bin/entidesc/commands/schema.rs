use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Table};
use entidesc::{
    Change, EntityDescriptor, MySqlAdapter, MySqlQuoting, SqlAdapter, TablePlan, column_spec, create_table_sql,
    plan_table,
};
use serde::Serialize;

use crate::context::ProjectContext;
use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay, add_table_header, themed_table};
use crate::theme::{self, PlanMark};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Inspect Entities",
        commands: &[
            "entidesc schema show user         # Fields of the user entity and their columns",
            "entidesc schema create user       # CREATE TABLE statement, no database needed",
        ],
    },
    ExampleGroup {
        title: "Plan Changes",
        commands: &[
            "entidesc schema plan              # Changes pending for every table",
            "entidesc schema plan user         # Changes pending for the user table",
            "entidesc --output json schema plan",
        ],
    },
];

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Show the fields of an entity and the columns they map to
    #[command(name = "show")]
    Show {
        /// Entity name
        entity: String,
    },

    /// Print the CREATE TABLE statement of an entity
    #[command(name = "create")]
    Create {
        /// Entity name
        entity: String,
    },

    /// Show the changes each table needs, without applying them
    #[command(name = "plan")]
    Plan {
        /// Entity to plan (optional, plans all if omitted)
        entity: Option<String>,
    },
}

pub async fn handle_schema_commands(command: SchemaCommands, output: &OutputManager) -> Result<()> {
    let ctx = ProjectContext::find()?;

    if !ctx.is_initialized() {
        output.error("entidesc is not initialized in this project.");
        output.info("Run 'entidesc init' first to initialize.");
        anyhow::bail!("Project not initialized");
    }

    match command {
        SchemaCommands::Show { entity } => {
            handle_show(&ctx, &entity, output)?;
        }
        SchemaCommands::Create { entity } => {
            let descriptor = load(&ctx, &entity)?;
            let sql = create_table_sql(&descriptor, &MySqlQuoting, &ctx.ddl_options())?;
            output.sql(&sql);
        }
        SchemaCommands::Plan { entity } => {
            handle_plan(&ctx, entity.as_deref(), output).await?;
        }
    }

    Ok(())
}

fn load(ctx: &ProjectContext, entity: &str) -> Result<EntityDescriptor> {
    ctx.loader()
        .load(entity)
        .with_context(|| format!("Failed to load entity '{entity}'"))
}

fn handle_show(ctx: &ProjectContext, entity: &str, output: &OutputManager) -> Result<()> {
    let descriptor = load(ctx, entity)?;
    let summary = EntitySummary::from_descriptor(&descriptor)?;

    if output.options.output_format == crate::output::OutputFormat::Table {
        output.heading(&format!("Entity: {}", summary.name));
        output.key_value("Table", &summary.table);
        if let Some(class) = &summary.class {
            output.key_value("Class", class);
        }
        if summary.is_abstract {
            output.warning("Abstract entity, no table is created for it");
        }
    }
    output.display(&summary)
}

async fn handle_plan(ctx: &ProjectContext, entity: Option<&str>, output: &OutputManager) -> Result<()> {
    let descriptors = match entity {
        Some(name) => vec![load(ctx, name)?],
        None => ctx.loader().load_all().context("Failed to load entity descriptors")?,
    };
    let descriptors: Vec<_> = descriptors.into_iter().filter(|d| !d.is_abstract).collect();
    if descriptors.is_empty() {
        output.warning("No concrete entity to plan");
        return Ok(());
    }

    let url = ctx.database_url()?;
    output.progress("Connecting to MySQL");
    let adapter = MySqlAdapter::connect(&url).await.context("Failed to connect to MySQL");
    output.clear_line();
    let adapter = adapter?;

    let report = PlanReport::build(&descriptors, &adapter).await?;
    output.display(&report)?;
    if report.plans.iter().all(TablePlan::is_unchanged) {
        output.success("Every table is up to date");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct FieldSummary {
    name: String,
    field_type: String,
    column_type: String,
    flags: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct EntitySummary {
    name: String,
    table: String,
    class: Option<String>,
    is_abstract: bool,
    fields: Vec<FieldSummary>,
    indexes: Vec<String>,
}

impl EntitySummary {
    fn from_descriptor(descriptor: &EntityDescriptor) -> Result<Self> {
        let mut fields = Vec::with_capacity(descriptor.fields.len());
        for field in descriptor.fields.values() {
            let column = column_spec(field, &descriptor.id_field)?;
            let mut flags = Vec::new();
            if column.primary_key {
                flags.push("primary key");
            }
            if column.nullable {
                flags.push("nullable");
            }
            if !field.writable {
                flags.push("readonly");
            }
            fields.push(FieldSummary {
                name: field.name.clone(),
                field_type: field.field_type.name().to_string(),
                column_type: column.column_type,
                flags,
            });
        }
        let indexes = descriptor
            .indexes
            .iter()
            .map(|index| match &index.name {
                Some(name) => format!("{} {name} ({})", index.kind, index.fields.join(", ")),
                None => format!("{} ({})", index.kind, index.fields.join(", ")),
            })
            .collect();

        Ok(Self {
            name: descriptor.name.clone(),
            table: descriptor.table().to_string(),
            class: descriptor.class.clone(),
            is_abstract: descriptor.is_abstract,
            fields,
            indexes,
        })
    }
}

impl TableDisplay for EntitySummary {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        add_table_header(&mut table, &["Field", "Type", "Column", "Flags"], options);
        for field in &self.fields {
            table.add_row(vec![
                Cell::new(&field.name),
                Cell::new(&field.field_type),
                Cell::new(&field.column_type),
                Cell::new(field.flags.join(", ")),
            ]);
        }
        for index in &self.indexes {
            table.add_row(vec![Cell::new(""), Cell::new("index"), Cell::new(index), Cell::new("")]);
        }
        table
    }

    fn to_compact(&self) -> String {
        let columns: Vec<String> = self
            .fields
            .iter()
            .map(|field| format!("{} {}", field.name, field.column_type))
            .collect();
        format!("{}: {}", self.table, columns.join(", "))
    }
}

#[derive(Debug, Serialize)]
struct PlanReport {
    plans: Vec<TablePlan>,
}

impl PlanReport {
    async fn build<A: SqlAdapter>(descriptors: &[EntityDescriptor], adapter: &A) -> Result<Self> {
        let mut plans = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let plan = plan_table(descriptor, adapter)
                .await
                .with_context(|| format!("Failed to plan table of '{}'", descriptor.name))?;
            plans.push(plan);
        }
        Ok(Self { plans })
    }
}

/// Mark, action and target of one change row.
fn describe(change: &Change) -> (PlanMark, &'static str, String) {
    match change {
        Change::ChangeColumn { name, column, current } => {
            let differences: Vec<String> = column.differences(current).iter().map(ToString::to_string).collect();
            (
                theme::CHANGED,
                "change column",
                format!(
                    "{name}: {} -> {} ({})",
                    current.column_type,
                    column.column_type,
                    differences.join(", ")
                ),
            )
        }
        Change::AddColumn(column) => (
            theme::ADDED,
            "add column",
            format!("{} {}", column.name, column.column_type),
        ),
        Change::DropColumn(name) => (theme::REMOVED, "drop column", name.clone()),
        Change::AddIndex(index) => (
            theme::ADDED,
            "add index",
            format!("{} ({})", index.kind, index.fields.join(", ")),
        ),
        Change::DropIndex(name) => (theme::REMOVED, "drop index", name.clone()),
    }
}

impl TableDisplay for PlanReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        add_table_header(&mut table, &["Table", "Action", "Target"], options);
        let marked = |mark: PlanMark, action: &str| {
            let cell = Cell::new(format!("{} {action}", mark.icon));
            if options.no_color { cell } else { cell.fg(mark.color) }
        };

        for plan in &self.plans {
            match plan {
                TablePlan::Create(create) => {
                    table.add_row(vec![
                        Cell::new(&create.table),
                        marked(theme::ADDED, "create table"),
                        Cell::new(format!(
                            "{} column(s), {} index(es)",
                            create.columns.len(),
                            create.indexes.len()
                        )),
                    ]);
                }
                TablePlan::Alter(alter) => {
                    for change in &alter.changes {
                        let (mark, action, target) = describe(change);
                        table.add_row(vec![
                            Cell::new(&alter.table),
                            marked(mark, action),
                            Cell::new(target),
                        ]);
                    }
                }
                TablePlan::Unchanged { table: name } => {
                    table.add_row(vec![
                        Cell::new(name),
                        marked(theme::CURRENT, "up to date"),
                        Cell::new(""),
                    ]);
                }
            }
        }
        table
    }

    fn to_compact(&self) -> String {
        self.plans
            .iter()
            .map(|plan| match plan {
                TablePlan::Create(create) => format!("{}: create", create.table),
                TablePlan::Alter(alter) => format!("{}: {} change(s)", alter.table, alter.changes.len()),
                TablePlan::Unchanged { table } => format!("{table}: unchanged"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
