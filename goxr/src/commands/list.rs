use humansize::{file_size_opts as options, FileSize};

use crate::cli::FilterArgs;

pub fn run(args: FilterArgs) -> anyhow::Result<()> {
    let bx = super::open_box(&args.boxfile)?;
    let meta = bx.metadata();
    let entries = meta.entries.filter(|entry| Ok(args.matches(&entry.name)))?;

    println!("Name:        {}", meta.name);
    println!("Description: {}", meta.description);
    println!("Version:     {}", meta.version);
    println!("Revision:    {}", meta.revision);
    println!("Built:       {}", meta.built.to_rfc3339());
    println!("Built by:    {}", meta.built_by);
    println!();

    println!("Mode     Length         Modified                   Path");
    println!("-------  -------------  -------------------------  --------");
    for entry in entries {
        let length = entry
            .length
            .file_size(options::BINARY)
            .unwrap_or_else(|_| entry.length.to_string());
        println!(
            "{:07o}  {:>12}   {:<25}  {}",
            entry.mode,
            length,
            entry.mod_time.format("%Y-%m-%d %H:%M:%S %Z"),
            entry.name,
        );
    }

    Ok(())
}
