use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use kanbanx_core::capture::Capture;
use kanbanx_core::engine::{
    self, add_board, move_card, move_column, remove_board, remove_card, remove_column, rename_board,
    rename_column, set_active_board, set_column_limit, sorted_columns, update_card, update_settings, visible_cards,
    parse_due_date, would_exceed_wip,
};
use kanbanx_core::media::format_size;
use kanbanx_core::transfer::EXPORT_FILE_NAME;
use kanbanx_core::types::{AppState, Column, SettingsPatch, Theme};
use kanbanx_sync::config::{default_config_path, load_config};
use kanbanx_sync::log_bridge;
use kanbanx_sync::orchestrator::RemoteSync;
use kanbanx_sync::session::{Session, SessionError};
use kanbanx_sync::{open_app, App};

#[derive(Parser, Debug)]
#[command(name = "kanbanx")]
#[command(about = "Kanban boards with an optional Google Drive mirror")]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the active board
    Show {
        /// Only cards whose title or description contains this
        #[arg(short, long)]
        query: Option<String>,
    },
    /// List boards
    Boards,
    AddBoard { name: String },
    RenameBoard { id: String, name: String },
    RemoveBoard { id: String },
    UseBoard { id: String },
    /// Add a column at the left of the active board
    AddColumn {
        name: String,
        #[arg(long)]
        wip: Option<String>,
    },
    RenameColumn { id: String, name: String },
    /// Set a WIP limit; anything but a non-negative number clears it
    Limit { column: String, value: String },
    RemoveColumn { id: String },
    /// Shift a column left (negative) or right
    MoveColumn {
        id: String,
        #[arg(allow_hyphen_values = true)]
        offset: i64,
    },
    /// Add a card to the first column, as the popup does
    Add {
        title: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Add a card from a page selection, as the context menu does
    Capture {
        #[arg(long)]
        selection: Option<String>,
        #[arg(long)]
        page_title: Option<String>,
        #[arg(long)]
        page_url: Option<String>,
    },
    Edit {
        card: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Comma separated
        #[arg(long)]
        labels: Option<String>,
        /// YYYY-MM-DD, empty to clear
        #[arg(long)]
        due: Option<String>,
        /// Append a checklist item
        #[arg(long)]
        check: Option<String>,
    },
    Move { card: String, column: String },
    Remove { card: String },
    Attach { card: String, path: PathBuf },
    Detach { card: String, attachment: String },
    Export { path: Option<PathBuf> },
    Import { path: PathBuf },
    Settings {
        #[arg(long)]
        theme: Option<ThemeArg>,
        #[arg(long)]
        compact: Option<bool>,
    },
    /// Store an OAuth refresh token for Drive
    Login { refresh_token: String },
    Connect,
    Disconnect,
    SignOut,
    /// Save the current state again, pushing it to Drive when connected
    Sync,
    Status,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = log_bridge::init() {
        log_bridge::write_fallback_line(&format!("failed to initialize logger: {}", e));
    }

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path);

    let mut app = match open_app(&config).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Unable to open boards: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&mut app, args.command.unwrap_or(Command::Show { query: None })).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            log::error!(target: "kanbanx.cli", "{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(app: &mut App, command: Command) -> Result<(), SessionError> {
    let session = &mut app.session;
    match command {
        Command::Show { query } => {
            let query = query.unwrap_or_else(|| session.state().ui.query.clone());
            print_board(session.state(), &query);
        }
        Command::Boards => {
            for board in &session.state().boards {
                let marker = if board.id == session.state().active_board_id { "*" } else { " " };
                println!("{} {}  {}", marker, board.id, board.name);
            }
        }
        Command::AddBoard { name } => report(session.apply(|s| add_board(s, &name)).await?),
        Command::RenameBoard { id, name } => report(session.apply(|s| rename_board(s, &id, &name)).await?),
        Command::RemoveBoard { id } => {
            if session.state().boards.len() == 1 {
                println!("Keep at least one board.");
                return Ok(());
            }
            report(session.apply(|s| remove_board(s, &id)).await?)
        }
        Command::UseBoard { id } => report(session.apply(|s| set_active_board(s, &id)).await?),
        Command::AddColumn { name, wip } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Ok(());
            }
            let wip = wip.as_deref().and_then(engine::parse_wip_limit);
            let column = Column::new(engine::new_id(), name, wip);
            report(session.apply(|s| engine::add_column(s, column)).await?)
        }
        Command::RenameColumn { id, name } => report(session.apply(|s| rename_column(s, &id, &name)).await?),
        Command::Limit { column, value } => report(session.apply(|s| set_column_limit(s, &column, &value)).await?),
        Command::RemoveColumn { id } => {
            let single = engine::active_board(session.state()).is_some_and(|b| b.columns.len() == 1);
            if single {
                println!("Keep at least one column.");
                return Ok(());
            }
            report(session.apply(|s| remove_column(s, &id)).await?)
        }
        Command::MoveColumn { id, offset } => report(session.apply(|s| move_column(s, &id, offset)).await?),
        Command::Add { title, url } => {
            let capture = Capture::Popup {
                title: title.unwrap_or_default(),
                tab_title: None,
                attach_url: url.is_some(),
                tab_url: url,
            };
            report(session.quick_add(&capture).await?)
        }
        Command::Capture {
            selection,
            page_title,
            page_url,
        } => {
            let capture = Capture::ContextMenu {
                selection,
                page_title,
                page_url,
            };
            report(session.quick_add(&capture).await?)
        }
        Command::Edit {
            card,
            title,
            description,
            labels,
            due,
            check,
        } => {
            let due = match due.as_deref().map(parse_due_date).transpose() {
                Ok(due) => due,
                Err(_) => {
                    println!("Due date must look like 2024-12-31.");
                    return Ok(());
                }
            };
            let outcome = session
                .apply(|s| {
                    update_card(s, &card, |c| {
                        if let Some(title) = title {
                            c.title = title;
                        }
                        if let Some(description) = description {
                            c.description = description;
                        }
                        if let Some(labels) = labels.as_deref() {
                            c.set_labels_from_input(labels);
                        }
                        if let Some(due) = due {
                            c.set_due_date(due);
                        }
                        if let Some(text) = check.as_deref() {
                            c.add_checklist_item(text);
                        }
                    })
                })
                .await?;
            report(outcome)
        }
        Command::Move { card, column } => {
            let full = engine::active_board(session.state())
                .and_then(|b| Some((b, b.column(&column)?)))
                .filter(|(b, _)| would_exceed_wip(b, &column, Some(card.as_str())))
                .map(|(_, c)| c.name.clone());
            if let Some(name) = full {
                println!("Cannot move card. \"{}\" is at its WIP limit.", name);
                return Ok(());
            }
            report(session.apply(|s| move_card(s, &card, &column)).await?)
        }
        Command::Remove { card } => report(session.apply(|s| remove_card(s, &card)).await?),
        Command::Attach { card, path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(kanbanx_core::attachments::BlobError::from)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());
            let meta = session.attach(&card, &name, "", &bytes).await?;
            println!("Attached {} ({}, {})", meta.name, meta.content_type, format_size(meta.size));
        }
        Command::Detach { card, attachment } => report(session.detach(&card, &attachment).await?),
        Command::Export { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from(EXPORT_FILE_NAME));
            let text = session.export()?;
            tokio::fs::write(&path, text)
                .await
                .map_err(kanbanx_core::storage::StoreError::from)?;
            println!("Exported to {}", path.display());
        }
        Command::Import { path } => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(kanbanx_core::storage::StoreError::from)?;
            report(session.import(&text).await?)
        }
        Command::Settings { theme, compact } => {
            let patch = SettingsPatch {
                theme: theme.map(Theme::from),
                compact,
            };
            report(session.apply(|s| update_settings(s, &patch)).await?)
        }
        Command::Login { refresh_token } => {
            app.tokens.save_credentials(&refresh_token).await?;
            println!("Credentials saved. Run `kanbanx connect` to start syncing.");
        }
        Command::Connect => {
            let settings = session.connect().await?;
            println!("Connected to Drive file {}", settings.file_id.unwrap_or_default());
        }
        Command::Disconnect => {
            session.disconnect().await;
            println!("Disconnected from Drive.");
        }
        Command::SignOut => {
            session.sign_out().await;
            println!("Signed out of Drive.");
        }
        Command::Sync => report(session.apply(AppState::clone).await?),
        Command::Status => print_status(session).await,
    }
    Ok(())
}

fn report(outcome: RemoteSync) {
    match outcome {
        RemoteSync::NotConnected | RemoteSync::Synced => {}
        RemoteSync::Recreated { file_id } => println!("Drive file was missing; created {}", file_id),
        RemoteSync::Unavailable => println!("Saved locally. Drive sign-in needed to sync."),
        RemoteSync::Failed(reason) => println!("Saved locally. Drive sync failed: {}", reason),
    }
}

fn print_board(state: &AppState, query: &str) {
    let Some(board) = engine::active_board(state) else {
        return;
    };
    println!("{}", board.name);
    for column in sorted_columns(board) {
        let count = engine::column_card_count(board, &column.id, None);
        match column.wip {
            Some(limit) => println!("\n[{}] {} ({}/{})", column.id, column.name, count, limit),
            None => println!("\n[{}] {} ({})", column.id, column.name, count),
        }
        for card in visible_cards(board, &column.id, query) {
            let done = card.checklist.iter().filter(|i| i.done).count();
            let mut line = format!("  {}  {}", card.id, card.title);
            if !card.labels.is_empty() {
                line.push_str(&format!("  #{}", card.labels.join(" #")));
            }
            if let Some(due) = &card.due_date {
                line.push_str(&format!("  due {}", due.get(..10).unwrap_or(due)));
            }
            if !card.checklist.is_empty() {
                line.push_str(&format!("  [{}/{}]", done, card.checklist.len()));
            }
            if !card.attachments.is_empty() {
                line.push_str(&format!("  +{} files", card.attachments.len()));
            }
            println!("{}", line);
        }
    }
}

async fn print_status(session: &Session) {
    let state = session.state();
    println!("Boards: {}", state.boards.len());
    println!("Theme: {:?}, compact: {}", state.settings.theme, state.settings.compact);
    match session.sync().drive_settings().await {
        Some(drive) if drive.is_connected() => {
            println!("Drive: connected ({})", drive.file_id.unwrap_or_default());
            println!("Last synced: {}", format_time(drive.last_synced_at));
        }
        _ => println!("Drive: not connected"),
    }
    println!("Log file: {}", log_bridge::log_file_path());
}

fn format_time(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| ms.to_string())
}
