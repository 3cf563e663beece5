use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use crate::context::{CONFIG_DIR, CONFIG_FILE, EntidescConfig, ProjectContext};
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Project Setup",
    commands: &[
        "entidesc init                     # Create .entidesc/config.toml and entities/",
        "entidesc init --force             # Rewrite the configuration with defaults",
    ],
}];

const SAMPLE_ENTITY: &str = r#"# Declares the `example` table. Rename or delete this file.
indexes = ["UNIQUE(email)"]

[fields]
name = "string(100)"
email = "email"
created = "datetime[nullable]"
"#;

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(long)]
    pub force: bool,
}

pub async fn handle_init(args: InitArgs, output: &OutputManager) -> Result<()> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    init_project(&current_dir, args.force, output)
}

fn init_project(root: &Path, force: bool, output: &OutputManager) -> Result<()> {
    let ctx = ProjectContext::from_root(root.to_path_buf())?;

    if ctx.is_initialized() && !force {
        output.warning(&format!("entidesc is already initialized in {}", ctx.project_root.display()));
        output.info("Use --force to rewrite the configuration.");
        return Ok(());
    }

    output.heading("Initialize entidesc");

    std::fs::create_dir_all(&ctx.config_dir)
        .with_context(|| format!("Failed to create {}", ctx.config_dir.display()))?;
    let config = toml::to_string_pretty(&EntidescConfig::default()).context("Failed to serialize configuration")?;
    std::fs::write(&ctx.config_path, config)
        .with_context(|| format!("Failed to write {}", ctx.config_path.display()))?;
    output.bullet(&format!("Created {CONFIG_DIR}/{CONFIG_FILE}"));

    if !ctx.entities_dir.exists() {
        std::fs::create_dir_all(&ctx.entities_dir)
            .with_context(|| format!("Failed to create {}", ctx.entities_dir.display()))?;
        std::fs::write(ctx.entities_dir.join("example.toml"), SAMPLE_ENTITY)
            .context("Failed to write the sample entity")?;
        output.bullet(&format!("Created {}/example.toml", ctx.entities_dir.display()));
    }

    output.success("entidesc initialized");
    output.info("Set DATABASE_URL, then run 'entidesc upgrade' to create the tables.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::GlobalOptions;
    use entidesc::DescriptorLoader;
    use tempfile::TempDir;

    fn quiet() -> OutputManager {
        OutputManager::new(GlobalOptions {
            quiet: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_init_creates_config_and_sample_entity() {
        let dir = TempDir::new().unwrap();
        init_project(dir.path(), false, &quiet()).unwrap();

        let ctx = ProjectContext::from_root(dir.path().to_path_buf()).unwrap();
        assert!(ctx.is_initialized());

        let sample = DescriptorLoader::new(&ctx.entities_dir).build("example").unwrap();
        assert_eq!(
            sample.field_names().collect::<Vec<_>>(),
            vec!["id", "name", "email", "created"]
        );
        assert_eq!(sample.indexes.len(), 1);
    }

    #[test]
    fn test_init_keeps_existing_config_without_force() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(CONFIG_FILE), "[mysql]\nengine = \"InnoDB\"\n").unwrap();

        init_project(dir.path(), false, &quiet()).unwrap();
        let ctx = ProjectContext::from_root(dir.path().to_path_buf()).unwrap();
        assert_eq!(ctx.config().mysql.engine, "InnoDB");

        init_project(dir.path(), true, &quiet()).unwrap();
        let ctx = ProjectContext::from_root(dir.path().to_path_buf()).unwrap();
        assert_eq!(ctx.config().mysql.engine, "MyISAM");
    }
}
