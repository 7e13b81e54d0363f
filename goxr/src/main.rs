mod cli;
mod commands;
mod logging;

use structopt::StructOpt;

use crate::cli::{CliOpts, Commands};

fn main() {
    let opts = CliOpts::from_iter(wild::args_os());

    if let Err(e) = logging::init(&opts.logging) {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }

    let result = match opts.cmd {
        Commands::Create(args) => commands::create::run(args),
        Commands::List(args) => commands::list::run(args),
        Commands::Cat(args) => commands::cat::run(args),
        Commands::Truncate(args) => commands::truncate::run(args),
        Commands::Validate(args) => commands::validate::run(args),
    };

    if let Err(e) = result {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}
