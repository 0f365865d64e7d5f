use clap::Parser;
use pamgrab::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{cluster, extract, group},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Extract(_) => "extract",
        Command::Cluster(_) => "cluster",
        Command::Group(_) => "group",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        subcommand_name
    );
    match cli.command {
        Command::Extract(args) => extract::extract(args)?,
        Command::Cluster(args) => cluster::cluster(args)?,
        Command::Group(args) => group::group(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
