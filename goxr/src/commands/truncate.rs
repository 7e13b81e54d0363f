use goxr_format::truncate_box;

use crate::cli::TruncateArgs;

pub fn run(args: TruncateArgs) -> anyhow::Result<()> {
    match truncate_box(&args.boxfile) {
        Ok(true) => {
            tracing::info!(path = %args.boxfile.display(), "box removed");
            Ok(())
        }
        Ok(false) if args.fail_if_no_box => {
            anyhow::bail!("`{}` does not contain a box", args.boxfile.display())
        }
        Ok(false) => {
            tracing::info!(path = %args.boxfile.display(), "no box to remove");
            Ok(())
        }
        Err(e) if e.is_not_found() && !args.fail_if_missing => {
            tracing::info!(path = %args.boxfile.display(), "file does not exist");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
