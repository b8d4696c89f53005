mod bootstrap_helpers;
mod cli_args;
mod commands;

use accswap_switch::AccountSwitcher;
use anyhow::{Context, Result};
use clap::Parser;

use crate::bootstrap_helpers::{ensure_not_root, init_tracing};
use crate::cli_args::Cli;
use crate::commands::{
    execute_add_command, execute_list_command, execute_purge_command, execute_remove_command,
    execute_status_command, execute_switch_command, execute_switch_to_command,
};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let home = dirs::home_dir().context("could not determine the home directory")?;
    let switcher = AccountSwitcher::new(home);
    init_tracing(cli.debug, &switcher.paths().log_file);
    ensure_not_root(switcher.platform())?;

    if cli.add_account {
        execute_add_command(&switcher)
    } else if let Some(identifier) = cli.remove_account.as_deref() {
        execute_remove_command(&switcher, identifier)
    } else if cli.list {
        execute_list_command(&switcher)
    } else if cli.switch {
        execute_switch_command(&switcher)
    } else if let Some(identifier) = cli.switch_to.as_deref() {
        execute_switch_to_command(&switcher, identifier)
    } else if cli.status {
        execute_status_command(&switcher)
    } else if cli.purge {
        execute_purge_command(&switcher)
    } else {
        // The argument group requires one action, so this is unreachable.
        anyhow::bail!("no action selected")
    }
}
