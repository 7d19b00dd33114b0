use std::path::PathBuf;

use clap::{value_parser, ArgAction, Args, Parser, Subcommand};
use harvest_core::{
    FetchRequest, GetRequest, HarvestCommand, RankRange, RankingWindow, ScanRequest,
};

pub const HARVEST_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\n{all-args}\n";

pub const HARVEST_BEFORE_HELP: &str = concat!(
    "harvest ",
    env!("CARGO_PKG_VERSION"),
    " – fetch the source of the most-downloaded PyPI packages\n\n",
    "\x1b[1;36mCommands\x1b[0m\n",
    "  fetch            Download and extract top-ranked packages not yet in info.json.\n",
    "  get              Download and extract a single package, optionally a pinned release.\n",
    "  scan             Run the source analyzer over every extracted package.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "harvest",
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = HARVEST_BEFORE_HELP,
    help_template = HARVEST_HELP_TEMPLATE
)]
pub struct HarvestCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandCli {
    #[command(
        about = "Fetch ranked packages into DIRECTORY, skipping those already recorded.",
        override_usage = "harvest fetch <DIRECTORY> [--workers N] [--limit START:STOP] [--days 30|365]"
    )]
    Fetch(FetchArgs),
    #[command(
        about = "Fetch one package into DIRECTORY and record it on success.",
        override_usage = "harvest get <DIRECTORY> <PACKAGE> [--release VERSION]"
    )]
    Get(GetArgs),
    #[command(
        about = "Scan extracted packages in DIRECTORY and list those with findings.",
        override_usage = "harvest scan <DIRECTORY> [--workers N]"
    )]
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[arg(value_name = "DIRECTORY", help = "Existing directory to extract into")]
    pub directory: PathBuf,
    #[arg(
        long,
        value_parser = value_parser!(usize),
        help = "Parallel downloads (default: HARVEST_WORKERS or 24)"
    )]
    pub workers: Option<usize>,
    #[arg(
        long,
        value_name = "START:STOP",
        allow_hyphen_values = true,
        value_parser = parse_rank_range,
        help = "Slice of the ranked list to consider, Python slice syntax"
    )]
    pub limit: Option<RankRange>,
    #[arg(
        long,
        value_name = "30|365",
        value_parser = parse_window,
        help = "Ranking window in days (default: HARVEST_DAYS or 365)"
    )]
    pub days: Option<RankingWindow>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[arg(value_name = "DIRECTORY", help = "Existing directory to extract into")]
    pub directory: PathBuf,
    #[arg(value_name = "PACKAGE")]
    pub package: String,
    #[arg(long, value_name = "VERSION", help = "Fetch this release instead of the latest")]
    pub release: Option<String>,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[arg(value_name = "DIRECTORY", help = "Directory holding extracted packages")]
    pub directory: PathBuf,
    #[arg(long, value_parser = value_parser!(usize), help = "Parallel scanners")]
    pub workers: Option<usize>,
}

fn parse_rank_range(raw: &str) -> Result<RankRange, String> {
    raw.parse()
}

fn parse_window(raw: &str) -> Result<RankingWindow, String> {
    raw.parse()
}

pub fn build_command(command: &CommandCli) -> HarvestCommand {
    match command {
        CommandCli::Fetch(args) => HarvestCommand::Fetch(FetchRequest {
            directory: args.directory.clone(),
            workers: args.workers,
            limit: args.limit.unwrap_or_default(),
            days: args.days,
        }),
        CommandCli::Get(args) => HarvestCommand::Get(GetRequest {
            directory: args.directory.clone(),
            package: args.package.clone(),
            release: args.release.clone(),
        }),
        CommandCli::Scan(args) => HarvestCommand::Scan(ScanRequest {
            directory: args.directory.clone(),
            workers: args.workers,
        }),
    }
}
