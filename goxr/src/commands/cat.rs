use std::io::Write;

use anyhow::Context;
use goxr_format::ReadBox;

use crate::cli::FilterArgs;

pub fn run(args: FilterArgs) -> anyhow::Result<()> {
    let mut bx = super::open_box(&args.boxfile)?;
    let names: Vec<String> = bx
        .metadata()
        .entries
        .filter(|entry| Ok(args.matches(&entry.name)))?
        .into_iter()
        .map(|entry| entry.name.clone())
        .collect();

    tracing::info!(source = %bx.metadata().short_string(), entries = names.len(), "displaying entries");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for name in &names {
        tracing::info!("  {}", name);
        let mut file = bx.open(name)?;
        std::io::copy(&mut file, &mut out).with_context(|| format!("Cannot print `{}`", name))?;
    }
    out.flush()?;

    bx.close()?;
    Ok(())
}
