//! Human-facing command handlers: prompts, confirmations, and output.

use std::io::Write;

use accswap_switch::{AccountSwitcher, AddOutcome, RotateOutcome};
use anyhow::{Context, Result};

const RESTART_NOTE: &str = "Restart Claude Code to pick up the new account.";

pub(crate) fn execute_add_command(switcher: &AccountSwitcher) -> Result<()> {
    match switcher.add_current_account()? {
        AddOutcome::Added { number, email } => {
            println!("Added account {number} ({email}).");
        }
        AddOutcome::AlreadyManaged { email } => {
            println!("Account {email} is already managed.");
        }
    }
    Ok(())
}

pub(crate) fn execute_remove_command(switcher: &AccountSwitcher, identifier: &str) -> Result<()> {
    let account = switcher.resolve_account(identifier)?;
    if account.is_active {
        println!(
            "Warning: account {} ({}) is currently active.",
            account.number, account.email
        );
    }
    if !confirm(&format!(
        "Remove account {} ({}) and its backups? [y/N]: ",
        account.number, account.email
    ))? {
        println!("Cancelled.");
        return Ok(());
    }
    let removed = switcher.remove_account(identifier)?;
    println!("Removed account {} ({}).", removed.number, removed.email);
    Ok(())
}

pub(crate) fn execute_list_command(switcher: &AccountSwitcher) -> Result<()> {
    if !switcher.registry_exists() {
        return first_run_setup(switcher);
    }
    let listings = switcher.list_accounts()?;
    if listings.is_empty() {
        println!("No accounts are managed.");
        return Ok(());
    }
    println!("Managed accounts (rotation order):");
    for entry in listings {
        let marker = if entry.is_active { "*" } else { " " };
        println!("  {marker} {}  {}", entry.number, entry.email);
    }
    Ok(())
}

fn first_run_setup(switcher: &AccountSwitcher) -> Result<()> {
    println!("No accounts are managed yet.");
    if !confirm("Back up the currently logged-in account now? [y/N]: ")? {
        println!("Cancelled.");
        return Ok(());
    }
    execute_add_command(switcher)
}

pub(crate) fn execute_switch_command(switcher: &AccountSwitcher) -> Result<()> {
    match switcher.rotate_next()? {
        RotateOutcome::Switched(account) => {
            println!("Switched to account {} ({}).", account.number, account.email);
            println!("{RESTART_NOTE}");
        }
        RotateOutcome::NothingToRotate { managed } => {
            println!("Only {managed} account(s) managed; nothing to switch to.");
        }
        RotateOutcome::AdoptedCurrent { number, email } => {
            println!("Current account {email} was not managed; added it as account {number}.");
            println!("Run again to switch.");
        }
    }
    Ok(())
}

pub(crate) fn execute_switch_to_command(
    switcher: &AccountSwitcher,
    identifier: &str,
) -> Result<()> {
    let account = switcher.switch_to(identifier)?;
    println!("Switched to account {} ({}).", account.number, account.email);
    println!("{RESTART_NOTE}");
    Ok(())
}

pub(crate) fn execute_status_command(switcher: &AccountSwitcher) -> Result<()> {
    let status = switcher.status()?;
    match status.active_email {
        Some(email) => match status.managed_number {
            Some(number) => println!("Active account: {email} (managed as account {number})"),
            None => println!("Active account: {email} (not managed)"),
        },
        None => println!("No active account found."),
    }
    println!("Managed accounts: {}", status.total_managed);
    println!("Platform: {}", switcher.platform().as_str());
    Ok(())
}

pub(crate) fn execute_purge_command(switcher: &AccountSwitcher) -> Result<()> {
    if !switcher.paths().backup_dir.exists() {
        println!("Nothing to purge.");
        return Ok(());
    }
    if !confirm("Delete ALL account backups and the backup directory? [y/N]: ")? {
        println!("Cancelled.");
        return Ok(());
    }
    let report = switcher.purge()?;
    for item in &report.removed {
        println!("Removed {item}.");
    }
    println!("Purge complete.");
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout()
        .flush()
        .context("failed to flush stdout")?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
