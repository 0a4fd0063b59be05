mod align;
mod config;
mod diff;
mod kv;
mod model;
mod orchestrator;
mod prompt;
mod remote;
mod render;
mod session;
mod slot;
mod store;
mod text;
mod workspace;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use align::{align, visible};
use config::Config;
use kv::{JsonFileStore, KeyValueStore};
use model::{sort_contacts, ContactPerson};
use orchestrator::SyncOrchestrator;
use prompt::{StderrNotifier, TerminalPrompt};
use remote::google::GooglePeopleClient;
use slot::{Slot, SyncDirection};
use store::{ContactStore, FetchStatus};
use workspace::{Workspace, SHOW_IDENTICAL_KEY};

type App = Workspace<GooglePeopleClient, JsonFileStore>;

const LOG_ENV: &str = "PAIRBOOK_LOG";

#[derive(Parser, Debug)]
#[command(name = "pairbook", version, about = "Reconcile the contacts of two Google accounts")]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store an access token for an account slot
    Login(LoginArgs),
    /// Forget a slot's token, account name and group selection
    Logout(SlotArgs),
    /// Show both slots without contacting the API
    Status,
    /// List the contact groups of an account
    Groups(SlotArgs),
    /// Choose the group whose members are compared (omit GROUP to clear)
    Select(SelectArgs),
    /// Fetch both accounts and list the aligned contacts
    Show(ShowArgs),
    /// Persist whether identical pairs are listed
    Identical(IdenticalArgs),
    /// Copy a contact from the other account into SLOT
    Create(CreateArgs),
    /// Overwrite one side of a pair with the other
    Sync(SyncArgs),
    /// Rename a contact in both accounts
    Rename(RenameArgs),
    /// Delete a contact from one account
    Delete(DeleteArgs),
    /// Re-read one contact from the API
    Refresh(NamedArgs),
    /// Write a slot's fetched contacts as JSON
    Export(ExportArgs),
    /// Align two exported JSON files offline
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct SlotArgs {
    /// Account slot: 1 (left) or 2 (right)
    slot: Slot,
}

#[derive(Args, Debug)]
struct LoginArgs {
    slot: Slot,

    /// OAuth access token with the contacts scope
    #[arg(long)]
    token: String,

    /// Account index used in contacts.google.com links
    #[arg(long)]
    auth_user: Option<String>,

    /// Token lifetime in seconds
    #[arg(long, value_name = "SECS")]
    expires_in: Option<u64>,
}

#[derive(Args, Debug)]
struct SelectArgs {
    slot: Slot,

    /// Group resource name or label
    group: Option<String>,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Include identical pairs
    #[arg(long)]
    all: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Args, Debug)]
struct IdenticalArgs {
    #[arg(value_enum)]
    state: Toggle,
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Slot that receives the new contact
    slot: Slot,

    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(Args, Debug)]
struct SyncArgs {
    #[arg(value_name = "NAME")]
    name: String,

    /// left-to-right (ltr) or right-to-left (rtl)
    direction: SyncDirection,

    /// Apply without asking
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Args, Debug)]
struct RenameArgs {
    #[arg(value_name = "NAME")]
    name: String,

    /// New name (asked interactively when omitted)
    #[arg(long, value_name = "NEW")]
    to: Option<String>,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    slot: Slot,

    #[arg(value_name = "NAME")]
    name: String,

    /// Delete without asking
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Args, Debug)]
struct NamedArgs {
    slot: Slot,

    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(Args, Debug)]
struct ExportArgs {
    slot: Slot,

    #[arg(value_name = "FILE")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct CompareArgs {
    #[arg(value_name = "LEFT")]
    left: PathBuf,

    #[arg(value_name = "RIGHT")]
    right: PathBuf,

    /// Include identical pairs
    #[arg(long)]
    all: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    init_logging(&config);

    let kv = JsonFileStore::open(&config.state_file)?;
    let api = GooglePeopleClient::new(&config.api);
    let ws = Workspace::new(api, kv, &config.api.contacts_web_url);

    match cli.command {
        Command::Login(args) => handle_login(args, &ws),
        Command::Logout(args) => handle_logout(args, &ws),
        Command::Status => handle_status(&ws, &config),
        Command::Groups(args) => handle_groups(args, &ws).await,
        Command::Select(args) => handle_select(args, &ws).await,
        Command::Show(args) => handle_show(args, &ws).await,
        Command::Identical(args) => handle_identical(args, &ws),
        Command::Create(args) => handle_create(args, &ws).await,
        Command::Sync(args) => handle_sync(args, &ws).await,
        Command::Rename(args) => handle_rename(args, &ws).await,
        Command::Delete(args) => handle_delete(args, &ws).await,
        Command::Refresh(args) => handle_refresh(args, &ws).await,
        Command::Export(args) => handle_export(args, &ws).await,
        Command::Compare(args) => handle_compare(args, ws.sessions().store()),
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

// =============================================================================
// Preconditions
// =============================================================================

fn require_connected(ws: &App, slot: Slot) -> Result<String> {
    match ws.token(slot) {
        Some(token) => Ok(token),
        None => bail!(
            "account {} is not connected (run `pairbook login {} --token ...`)",
            slot,
            slot
        ),
    }
}

fn require_group(ws: &App, slot: Slot) -> Result<String> {
    require_connected(ws, slot)?;
    match ws.selected_group(slot) {
        Some(group) => Ok(group),
        None => bail!(
            "no group selected for account {} (run `pairbook select {} GROUP`)",
            slot,
            slot
        ),
    }
}

fn check_fetch(slot: Slot, status: FetchStatus) -> Result<()> {
    match status {
        FetchStatus::Loaded(_) | FetchStatus::Skipped => Ok(()),
        FetchStatus::Failed => bail!("failed to load contacts for account {}", slot),
        FetchStatus::Unauthorized => bail!(
            "account {} rejected its token and was signed out; log in again",
            slot
        ),
    }
}

fn loading_message(contacts: &ContactStore) -> String {
    let loading: Vec<String> = Slot::ALL
        .into_iter()
        .filter(|slot| contacts.is_loading(*slot))
        .map(|slot| slot.to_string())
        .collect();
    if loading.is_empty() {
        "Fetching contacts...".to_string()
    } else {
        format!("Fetching contacts for account {}...", loading.join(" and "))
    }
}

/// Connect the given slots concurrently and fail on the first bad fetch.
async fn connect(ws: &App, slots: &[Slot]) -> Result<()> {
    let pb = spinner(loading_message(ws.contacts()));
    let fetch = ws.connect_slots(slots);
    tokio::pin!(fetch);
    let statuses = loop {
        tokio::select! {
            statuses = &mut fetch => break statuses,
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                pb.set_message(loading_message(ws.contacts()));
            }
        }
    };
    pb.finish_and_clear();

    for slot in Slot::ALL {
        check_fetch(slot, statuses[slot])?;
    }
    Ok(())
}

fn find_contact(ws: &App, slot: Slot, name: &str) -> Result<ContactPerson> {
    ws.contacts()
        .find_by_name(slot, name)
        .with_context(|| format!("no contact named '{}' in account {}", name.trim(), slot))
}

type Orchestrator<'w> =
    SyncOrchestrator<'w, GooglePeopleClient, JsonFileStore, TerminalPrompt, StderrNotifier>;

fn orchestrator(ws: &App, prompt: TerminalPrompt) -> Orchestrator<'_> {
    SyncOrchestrator::new(ws, prompt, StderrNotifier::default())
}

// =============================================================================
// Session commands
// =============================================================================

fn handle_login(args: LoginArgs, ws: &App) -> Result<()> {
    let token = args.token.trim();
    if token.is_empty() {
        bail!("--token must not be empty");
    }
    ws.sessions()
        .sign_in(args.slot, token, args.expires_in, args.auth_user.as_deref());
    if ws.token(args.slot).is_none() {
        bail!("token for account {} is already expired", args.slot);
    }
    println!("Signed in to account {}", args.slot);
    Ok(())
}

fn handle_logout(args: SlotArgs, ws: &App) -> Result<()> {
    ws.sign_out(args.slot);
    println!("Signed out of account {}", args.slot);
    Ok(())
}

fn format_expiry(ms: i128) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(ms * 1_000_000)
        .ok()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| ms.to_string())
}

fn handle_status(ws: &App, config: &Config) -> Result<()> {
    println!("Configuration: {}", config.config_path.display());
    println!("State: {}", ws.sessions().store().path().display());
    for slot in Slot::ALL {
        println!();
        if ws.token(slot).is_none() {
            println!("Account {}: not connected", slot);
            continue;
        }
        println!("Account {}: {}", slot, ws.account_label(slot));
        println!(
            "  Group: {}",
            ws.selected_group(slot).as_deref().unwrap_or("(none)")
        );
        if let Some(ms) = ws.sessions().expires_at(slot) {
            println!("  Expires: {}", format_expiry(ms));
        }
        println!("  Contacts: {}", ws.contacts_url(slot));
    }
    println!();
    println!(
        "Identical contacts: {}",
        if ws.show_identical() { "shown" } else { "hidden" }
    );
    Ok(())
}

fn handle_identical(args: IdenticalArgs, ws: &App) -> Result<()> {
    let show = matches!(args.state, Toggle::On);
    ws.set_show_identical(show);
    println!(
        "Identical contacts will be {}",
        if show { "shown" } else { "hidden" }
    );
    Ok(())
}

// =============================================================================
// Groups
// =============================================================================

async fn fetch_groups(ws: &App, slot: Slot, token: &str) -> Result<()> {
    let pb = spinner(format!("Fetching groups for account {}...", slot));
    let (status, _) = tokio::join!(
        ws.groups().fetch_groups(ws.api(), ws.sessions(), slot, token),
        ws.groups()
            .fetch_account_name(ws.api(), ws.sessions().store(), slot, token),
    );
    pb.finish_and_clear();

    match status {
        FetchStatus::Failed => bail!("failed to load groups for account {}", slot),
        FetchStatus::Unauthorized => {
            ws.contacts().clear(slot);
            bail!(
                "account {} rejected its token and was signed out; log in again",
                slot
            )
        }
        _ => Ok(()),
    }
}

async fn handle_groups(args: SlotArgs, ws: &App) -> Result<()> {
    let token = require_connected(ws, args.slot)?;
    fetch_groups(ws, args.slot, &token).await?;

    let groups = ws.groups().groups(args.slot);
    if groups.is_empty() {
        println!("No groups in account {}", args.slot);
        return Ok(());
    }
    print!(
        "{}",
        render::group_list(&groups, ws.selected_group(args.slot).as_deref())
    );
    Ok(())
}

async fn handle_select(args: SelectArgs, ws: &App) -> Result<()> {
    let token = require_connected(ws, args.slot)?;

    let Some(query) = args.group.as_deref().filter(|q| !q.trim().is_empty()) else {
        ws.select_group(args.slot, None).await;
        println!("Cleared group selection for account {}", args.slot);
        return Ok(());
    };

    fetch_groups(ws, args.slot, &token).await?;
    let group = ws.groups().find_group(args.slot, query).with_context(|| {
        format!(
            "no group matching '{}' in account {} (see `pairbook groups {}`)",
            query.trim(),
            args.slot,
            args.slot
        )
    })?;

    let pb = spinner(format!("Fetching members of {}...", group.name));
    let status = ws.select_group(args.slot, Some(&group.resource_name)).await;
    pb.finish_and_clear();
    check_fetch(args.slot, status)?;

    let count = ws.contacts().contacts(args.slot).len();
    println!(
        "Selected {} for account {} ({} contact(s))",
        group.name, args.slot, count
    );
    Ok(())
}

// =============================================================================
// Listing
// =============================================================================

async fn handle_show(args: ShowArgs, ws: &App) -> Result<()> {
    let connected: Vec<Slot> = Slot::ALL
        .into_iter()
        .filter(|slot| ws.token(*slot).is_some())
        .collect();
    if connected.is_empty() {
        bail!("no account is connected (run `pairbook login 1 --token ...`)");
    }
    for slot in &connected {
        if ws.selected_group(*slot).is_none() {
            eprintln!("warning: no group selected for account {}", slot);
        }
    }

    connect(ws, &connected).await?;

    let orch = orchestrator(ws, TerminalPrompt::new(false));
    let total = ws.aligned().len();
    let shown = if args.all {
        ws.aligned()
    } else {
        orch.visible_pairs()
    };
    println!(
        "Left: {}    Right: {}",
        ws.account_label(Slot::One),
        ws.account_label(Slot::Two)
    );
    print!("{}", render::pair_table(&shown, total));
    Ok(())
}

async fn handle_export(args: ExportArgs, ws: &App) -> Result<()> {
    require_group(ws, args.slot)?;
    connect(ws, &[args.slot]).await?;

    let contacts = ws.contacts().contacts(args.slot);
    let json = serde_json::to_string_pretty(&contacts)?;
    fs::write(&args.output, json)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "Exported {} contact(s) from account {} to {}",
        contacts.len(),
        args.slot,
        args.output.display()
    );
    Ok(())
}

/// Either a bare array of people or a `connections` page.
#[derive(Deserialize)]
#[serde(untagged)]
enum PeopleFile {
    List(Vec<ContactPerson>),
    Page {
        #[serde(default)]
        connections: Vec<ContactPerson>,
    },
}

fn read_people(path: &Path) -> Result<Vec<ContactPerson>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: PeopleFile = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a list of contacts", path.display()))?;
    let mut people = match file {
        PeopleFile::List(people) => people,
        PeopleFile::Page { connections } => connections,
    };
    sort_contacts(&mut people);
    Ok(people)
}

fn handle_compare(args: CompareArgs, kv: &JsonFileStore) -> Result<()> {
    let left = read_people(&args.left)?;
    let right = read_people(&args.right)?;

    let pairs = align(&left, &right);
    let total = pairs.len();
    let show_identical = args.all || kv.get_bool(SHOW_IDENTICAL_KEY, false);
    let shown = visible(pairs, show_identical, &HashSet::new());
    print!("{}", render::pair_table(&shown, total));
    Ok(())
}

// =============================================================================
// Mutations
// =============================================================================

async fn handle_create(args: CreateArgs, ws: &App) -> Result<()> {
    let source_slot = args.slot.other();
    require_group(ws, args.slot)?;
    require_group(ws, source_slot)?;
    connect(ws, &Slot::ALL).await?;

    let source = find_contact(ws, source_slot, &args.name)?;
    if ws.contacts().find_by_name(args.slot, &args.name).is_some() {
        bail!(
            "'{}' already exists in account {}; use `pairbook sync` instead",
            args.name.trim(),
            args.slot
        );
    }

    let orch = orchestrator(ws, TerminalPrompt::new(true));
    match orch.create_contact(args.slot, &source).await {
        Some(created) => {
            let url = ws.person_url(args.slot, &created);
            println!("Created in account {}:", args.slot);
            print!("{}", render::contact_details(&created, Some(url.as_str())));
            Ok(())
        }
        None => bail!("contact was not created"),
    }
}

async fn handle_sync(args: SyncArgs, ws: &App) -> Result<()> {
    let source_slot = args.direction.source_slot();
    let target_slot = args.direction.target_slot();
    require_group(ws, source_slot)?;
    require_group(ws, target_slot)?;
    connect(ws, &Slot::ALL).await?;

    let source = find_contact(ws, source_slot, &args.name)?;
    let target = find_contact(ws, target_slot, &args.name)?;

    let orch = orchestrator(ws, TerminalPrompt::new(args.yes));
    match orch.sync_contact(&source, &target, args.direction).await {
        Some(updated) => {
            let url = ws.person_url(target_slot, &updated);
            println!("Updated account {}:", target_slot);
            print!("{}", render::contact_details(&updated, Some(url.as_str())));
            Ok(())
        }
        None if orch.notifier().raised() > 0 => bail!("sync did not complete"),
        None => {
            println!("Sync cancelled");
            Ok(())
        }
    }
}

async fn handle_rename(args: RenameArgs, ws: &App) -> Result<()> {
    require_group(ws, Slot::One)?;
    require_group(ws, Slot::Two)?;
    connect(ws, &Slot::ALL).await?;

    let name = args.name.trim();
    let pair = ws
        .aligned()
        .into_iter()
        .find(|pair| pair.name == name)
        .with_context(|| format!("no contact named '{}' in either account", name))?;
    if pair.contact1.is_none() || pair.contact2.is_none() {
        bail!("'{}' exists in only one account; rename needs both", name);
    }

    let orch = orchestrator(ws, TerminalPrompt::new(false).with_rename(args.to));
    let renamed = orch.rename_both(&pair).await;
    if orch.notifier().raised() > 0 {
        bail!("rename did not complete in every account");
    }
    match renamed {
        Some(new_name) => println!("Renamed '{}' to '{}'", name, new_name),
        None => println!("Name unchanged"),
    }
    Ok(())
}

async fn handle_delete(args: DeleteArgs, ws: &App) -> Result<()> {
    require_group(ws, args.slot)?;
    connect(ws, &[args.slot]).await?;

    let contact = find_contact(ws, args.slot, &args.name)?;
    let orch = orchestrator(ws, TerminalPrompt::new(args.yes));
    if orch.delete_contact(args.slot, &contact).await {
        println!("Deleted '{}' from account {}", args.name.trim(), args.slot);
        return Ok(());
    }
    if orch.notifier().raised() > 0 {
        bail!("contact was not deleted");
    }
    println!("Delete cancelled");
    Ok(())
}

async fn handle_refresh(args: NamedArgs, ws: &App) -> Result<()> {
    require_group(ws, args.slot)?;
    connect(ws, &[args.slot]).await?;

    let contact = find_contact(ws, args.slot, &args.name)?;
    let orch = orchestrator(ws, TerminalPrompt::new(false));
    match orch.refresh_contact(args.slot, &contact).await {
        Some(fresh) => {
            let url = ws.person_url(args.slot, &fresh);
            print!("{}", render::contact_details(&fresh, Some(url.as_str())));
            Ok(())
        }
        None => bail!(
            "'{}' could not be re-read or is no longer in the selected group",
            args.name.trim()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sync_direction_aliases() {
        let cli = Cli::parse_from(["pairbook", "sync", "Alice", "rtl", "--yes"]);
        match cli.command {
            Command::Sync(args) => {
                assert_eq!(args.direction, SyncDirection::RightToLeft);
                assert!(args.yes);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn loading_message_names_busy_slots() {
        let contacts = ContactStore::new();
        assert_eq!(loading_message(&contacts), "Fetching contacts...");
    }

    #[test]
    fn expiry_is_shown_as_rfc3339() {
        assert_eq!(format_expiry(0), "1970-01-01T00:00:00Z");
    }
}
