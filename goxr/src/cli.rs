use std::path::PathBuf;

use chrono::{DateTime, Utc};
use goxr_format::{OpenMode, WriteMode};
use regex::Regex;
use structopt::clap::AppSettings::*;
use structopt::StructOpt;

use crate::logging::LoggingOpts;

fn parse_built(src: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(src).map(|t| t.with_timezone(&Utc))
}

#[derive(Debug, StructOpt)]
pub struct CreateArgs {
    #[structopt(
        short,
        long,
        default_value = "openOnly",
        help = "How to open <boxfile>: openOrCreate, openOnly or createOnly"
    )]
    pub open_mode: OpenMode,

    #[structopt(
        short,
        long,
        default_value = "newOnly",
        help = "How to treat a box already inside <boxfile>: newOrReplace, newOnly or replaceOnly"
    )]
    pub write_mode: WriteMode,

    #[structopt(
        short,
        long,
        parse(try_from_str = parse_built),
        help = "Build timestamp of the box (RFC 3339) [default: now]"
    )]
    pub built: Option<DateTime<Utc>>,

    #[structopt(
        short,
        long,
        help = "Revision of the box [default: derived from the build timestamp]"
    )]
    pub revision: Option<String>,

    #[structopt(name = "boxfile", parse(from_os_str), help = "File to write the box into")]
    pub boxfile: PathBuf,

    #[structopt(name = "box-name", help = "Name of the box")]
    pub name: String,

    #[structopt(name = "box-version", help = "Version of the box")]
    pub version: String,

    #[structopt(name = "description", help = "Description of the box")]
    pub description: String,

    #[structopt(
        name = "paths",
        required = true,
        help = "Directories to add, optionally as <prefix>=<directory>"
    )]
    pub paths: Vec<String>,
}

#[derive(Debug, StructOpt)]
pub struct FilterArgs {
    #[structopt(name = "boxfile", parse(from_os_str), help = "File containing the box")]
    pub boxfile: PathBuf,

    #[structopt(
        name = "patterns",
        help = "Only entries whose path matches at least one of these regular expressions"
    )]
    pub patterns: Vec<Regex>,
}

impl FilterArgs {
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.is_match(path))
    }
}

#[derive(Debug, StructOpt)]
pub struct TruncateArgs {
    #[structopt(
        long,
        default_value = "true",
        parse(try_from_str),
        help = "Fail if the file exists but does not contain a box"
    )]
    pub fail_if_no_box: bool,

    #[structopt(
        long,
        default_value = "true",
        parse(try_from_str),
        help = "Fail if the file does not exist"
    )]
    pub fail_if_missing: bool,

    #[structopt(name = "boxfile", parse(from_os_str), help = "File to remove the box from")]
    pub boxfile: PathBuf,
}

#[derive(Debug, StructOpt)]
pub struct ValidateArgs {
    #[structopt(name = "boxfile", parse(from_os_str), help = "File containing the box")]
    pub boxfile: PathBuf,
}

#[derive(Debug, StructOpt)]
pub enum Commands {
    #[structopt(about = "Create a box inside a file from one or more directories")]
    Create(CreateArgs),

    #[structopt(about = "List the entries of a box")]
    List(FilterArgs),

    #[structopt(about = "Print the content of box entries to stdout")]
    Cat(FilterArgs),

    #[structopt(about = "Remove a box from a file, keeping whatever preceded it")]
    Truncate(TruncateArgs),

    #[structopt(about = "Verify the checksum of every entry")]
    Validate(ValidateArgs),
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "goxr",
    about = "Pack directories into boxes appended to any file, and inspect them.",
    settings = &[SubcommandRequiredElseHelp, DisableHelpSubcommand, VersionlessSubcommands]
)]
pub struct CliOpts {
    #[structopt(flatten)]
    pub logging: LoggingOpts,

    #[structopt(subcommand)]
    pub cmd: Commands,
}
