use super::context::CliContext;
use anyhow::{Context, Result};

pub fn show(ctx: &CliContext) -> Result<()> {
    let rendered = toml::to_string_pretty(&ctx.config).context("Failed to render config")?;
    println!("# {}", ctx.storage.path().display());
    print!("{}", rendered);
    println!("# spool: {}", ctx.spool_dir.display());
    Ok(())
}

pub fn init(ctx: &CliContext) -> Result<()> {
    if ctx.storage.path().exists() {
        println!("Config already exists at {}", ctx.storage.path().display());
        return Ok(());
    }
    ctx.storage.save(&ctx.config)?;
    println!("✅ Wrote {}", ctx.storage.path().display());
    Ok(())
}

pub fn path(ctx: &CliContext) {
    println!("{}", ctx.storage.path().display());
}
