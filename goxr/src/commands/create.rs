use anyhow::Context;
use chrono::{SubsecRound, Utc};
use goxr_format::{BoxMetadata, BoxWriter};

use crate::cli::CreateArgs;

pub fn built_by() -> String {
    format!(
        "goxr {} ({}/{})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

pub fn run(args: CreateArgs) -> anyhow::Result<()> {
    let mut writer = BoxWriter::new(&args.boxfile, args.open_mode, args.write_mode)
        .with_context(|| format!("Cannot create box in `{}`", args.boxfile.display()))?;

    {
        let mut meta = writer.metadata_mut();
        meta.name = args.name.clone();
        meta.version = args.version.clone();
        meta.description = args.description.clone();
        let built = args.built.unwrap_or_else(|| Utc::now().trunc_subsecs(3));
        meta.built = built;
        meta.revision = match &args.revision {
            Some(revision) => revision.clone(),
            None => BoxMetadata::revision_for(built),
        };
        meta.built_by = built_by();

        tracing::info!(
            path = %args.boxfile.display(),
            name = %meta.name,
            version = %meta.version,
            revision = %meta.revision,
            built = %meta.built.to_rfc3339(),
            "creating box"
        );
    }

    // The box file itself may sit inside one of the walked directories.
    let own = std::fs::canonicalize(&args.boxfile).ok();

    for base in &args.paths {
        tracing::info!(base = %base, "adding files");
        writer
            .write_files_recursive_with(base, |candidate| {
                if own.is_some() && std::fs::canonicalize(&candidate.source_filename).ok() == own {
                    candidate.accept = false;
                    return Ok(());
                }
                tracing::info!(
                    source = %candidate.source_filename.display(),
                    "  {}",
                    candidate.target.filename
                );
                Ok(())
            })
            .with_context(|| format!("Cannot add files of `{}`", base))?;
    }

    let entries = writer.metadata().entries.len();
    writer
        .close()
        .with_context(|| format!("Cannot finish box in `{}`", args.boxfile.display()))?;

    tracing::info!(entries, "box created");
    Ok(())
}
