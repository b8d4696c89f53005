use clap::Parser;

/// Command-line surface of the `accswap` binary. Exactly one action flag
/// must be given; actions are mutually exclusive.
#[derive(Debug, Parser)]
#[command(
    name = "accswap",
    about = "Switch between multiple Claude Code accounts",
    version
)]
#[command(group = clap::ArgGroup::new("action").required(true).multiple(false))]
pub struct Cli {
    #[arg(
        long,
        group = "action",
        help = "Back up the currently logged-in account as a new managed slot"
    )]
    pub add_account: bool,

    #[arg(
        long,
        group = "action",
        value_name = "NUM|EMAIL",
        help = "Remove a managed account and its backups"
    )]
    pub remove_account: Option<String>,

    #[arg(long, group = "action", help = "List managed accounts in rotation order")]
    pub list: bool,

    #[arg(long, group = "action", help = "Switch to the next account in rotation")]
    pub switch: bool,

    #[arg(
        long,
        group = "action",
        value_name = "NUM|EMAIL",
        help = "Switch to a specific managed account"
    )]
    pub switch_to: Option<String>,

    #[arg(long, group = "action", help = "Show the active account and managed count")]
    pub status: bool,

    #[arg(
        long,
        group = "action",
        help = "Delete all managed backups and the backup directory"
    )]
    pub purge: bool,

    #[arg(long, help = "Enable debug logging")]
    pub debug: bool,
}
