use anyhow::{Context, Result};
use clap::Subcommand;
use entidesc::{DescriptorCache, FsDescriptorCache};

use crate::context::ProjectContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Descriptor Cache",
    commands: &["entidesc cache clear              # Drop every cached descriptor"],
}];

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Remove every cached descriptor, forcing a rebuild on next load
    #[command(name = "clear")]
    Clear,
}

pub fn handle_cache_commands(command: CacheCommands, output: &OutputManager) -> Result<()> {
    let ctx = ProjectContext::find()?;

    if !ctx.is_initialized() {
        output.error("entidesc is not initialized in this project.");
        output.info("Run 'entidesc init' first to initialize.");
        anyhow::bail!("Project not initialized");
    }

    match command {
        CacheCommands::Clear => {
            let cache = FsDescriptorCache::new(&ctx.cache_dir);
            let removed = cache
                .clear()
                .with_context(|| format!("Failed to clear {}", ctx.cache_dir.display()))?;
            output.success(&format!("Removed {removed} cached descriptor(s)"));
        }
    }

    Ok(())
}
