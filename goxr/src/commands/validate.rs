use crate::cli::ValidateArgs;

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let bx = super::open_box(&args.boxfile)?;
    let stats = bx.validate()?;

    for path in &stats.failed {
        println!("Checksum failure: {}", path);
    }
    println!(
        "Validated {} files ({} failures)",
        stats.files_checked, stats.checksum_failures
    );

    if !stats.is_ok() {
        anyhow::bail!(
            "{} of {} entries in `{}` failed validation",
            stats.checksum_failures,
            stats.files_checked,
            args.boxfile.display()
        );
    }

    Ok(())
}
