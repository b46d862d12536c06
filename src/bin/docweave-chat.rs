//! Interactive terminal client for DocWeave.
//!
//! Upload PDFs into rooms and ask questions about them from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local backend
//! docweave-chat
//!
//! # Point at another deployment and stream answers
//! docweave-chat --api-url https://docweave.example.com/api/ --stream
//!
//! # Disable colors (useful for piping output)
//! docweave-chat --no-color
//! ```
//!
//! Set `RUST_LOG=docweave=debug` to see request and polling logs on stderr.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use docweave::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, format_header,
    format_history, format_rooms, format_user, help_text, parse_command,
};
use docweave::config::expand_home;
use docweave::{AuthState, DocWeave, FileTokenStore, Notice, NoticeLevel, RoomStore, TokenStore};

/// Main entry point for the docweave-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("docweave-chat [OPTIONS]");
    init_tracing();
    let config = ChatConfig::from_args(args)?;
    let use_color = config.use_color;

    // Flag for skipping the rest of a reveal
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(utf8path::Path::from(
        config.token_path.as_str(),
    )));
    let client = DocWeave::connect(&config.client, tokens).await?;
    let store = Arc::new(RoomStore::new(client.clone(), &config.client));
    let poller = store.spawn_poller();
    let printer = spawn_notice_printer(store.notices(), use_color);

    let mut renderer = PlainTextRenderer::with_color_and_interrupt(use_color, interrupted.clone());
    let mut rl = DefaultEditor::new()?;

    println!("DocWeave ({})", client.base_url());
    println!("Type /help for commands, /quit to exit\n");

    'session: loop {
        if !client.session().is_authenticated() {
            match authenticate(&mut rl, &client, &mut renderer).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    renderer.print_error(&format!("Input error: {err}"));
                    break;
                }
            }
        }
        let _ = store.select_room(None).await;
        if store.refresh_rooms().await.is_ok() {
            renderer.print_header("Rooms");
            renderer.print_info(&format_rooms(&store.rooms(), None));
        }

        loop {
            // Reset interrupt flag before each input
            interrupted.store(false, Ordering::Relaxed);

            if !client.session().is_authenticated() {
                let state = client.session().subscribe().borrow().clone();
                if state == AuthState::Expired {
                    renderer.print_error("Your session has expired. Please log in again.");
                }
                continue 'session;
            }

            let prompt = match store.current_room() {
                Some(room) => format!("{}> ", room.title),
                None => "docweave> ".to_string(),
            };
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);

                    if let Some(cmd) = parse_command(line) {
                        match cmd {
                            ChatCommand::Quit => {
                                println!("Goodbye!");
                                break 'session;
                            }
                            ChatCommand::Help => {
                                for line in help_text().lines() {
                                    println!("    {}", line);
                                }
                            }
                            ChatCommand::Rooms => {
                                if store.refresh_rooms().await.is_ok() {
                                    renderer.print_info(&format_rooms(
                                        &store.rooms(),
                                        store.current_room_id(),
                                    ));
                                }
                            }
                            ChatCommand::Open(id) => {
                                if !store.rooms().iter().any(|r| r.id == id) {
                                    renderer.print_error(&format!(
                                        "No room with id {id}; /rooms lists them."
                                    ));
                                    continue;
                                }
                                if store.select_room(Some(id)).await.is_ok() {
                                    print_room(&store, &mut renderer);
                                }
                            }
                            ChatCommand::New => {
                                let _ = store.select_room(None).await;
                                renderer.print_info(
                                    "Left the room. /upload <path> starts a new one.",
                                );
                            }
                            ChatCommand::Upload(path) => {
                                let path = expand_home(&path);
                                renderer.print_info(&format!("Uploading {path}..."));
                                if let Ok(room) =
                                    store.upload(&utf8path::Path::from(path.as_str())).await
                                {
                                    renderer.print_success(&format!(
                                        "Uploaded into [{}] {}",
                                        room.id, room.title
                                    ));
                                    renderer.print_header(&format_header(
                                        Some(&room),
                                        store.upload_status(),
                                    ));
                                }
                            }
                            ChatCommand::Delete(id) => {
                                let result = store
                                    .delete_room(id, |room| {
                                        confirm(&mut rl, &format!("Delete \"{}\"? [y/N] ", room.title))
                                    })
                                    .await;
                                if let Ok(false) = result {
                                    renderer.print_info("Kept the room.");
                                }
                            }
                            ChatCommand::History => print_room(&store, &mut renderer),
                            ChatCommand::Status => print_status(&store, &mut renderer),
                            ChatCommand::WhoAmI => {
                                renderer.print_info(&format_user(client.session().user().as_ref()));
                            }
                            ChatCommand::Logout => {
                                client.session().logout().await;
                                renderer.print_info("Logged out.");
                                continue 'session;
                            }
                            ChatCommand::Invalid(message) => {
                                renderer.print_error(&message);
                            }
                        }
                        continue;
                    }

                    // Regular line - ask it in the current room
                    match store.send(line, &mut renderer).await {
                        Ok(true) => {}
                        Ok(false) => explain_refusal(&store, &mut renderer),
                        Err(err) if err.is_session_terminal() => {}
                        Err(err) => tracing::debug!(error = %err, "answer failed"),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C at prompt - soft interrupt
                    println!();
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!("\nGoodbye!");
                    break 'session;
                }
                Err(err) => {
                    renderer.print_error(&format!("Input error: {}", err));
                    break 'session;
                }
            }
        }
    }

    poller.abort();
    printer.abort();
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Prompt for credentials until login succeeds; false on end of input.
async fn authenticate(
    rl: &mut DefaultEditor,
    client: &DocWeave,
    renderer: &mut PlainTextRenderer,
) -> Result<bool, ReadlineError> {
    renderer.print_header("Log in (enter 'signup' as the email to create an account)");
    renderer.print_info("Passwords are echoed as you type them.");
    loop {
        let Some(email) = read_field(rl, "email: ")? else {
            return Ok(false);
        };
        let result = if email == "signup" {
            let Some(email) = read_field(rl, "email: ")? else {
                return Ok(false);
            };
            let Some(name) = read_field(rl, "name: ")? else {
                return Ok(false);
            };
            let Some(password) = read_field(rl, "password: ")? else {
                return Ok(false);
            };
            client.session().signup(&email, &password, &name).await
        } else {
            let Some(password) = read_field(rl, "password: ")? else {
                return Ok(false);
            };
            client.session().login(&email, &password).await
        };
        match result {
            Ok(session) => {
                let name = session
                    .user
                    .as_ref()
                    .map(|u| u.name.clone())
                    .unwrap_or_else(|| "back".to_string());
                renderer.print_success(&format!("Welcome, {name}!"));
                return Ok(true);
            }
            Err(err) => renderer.print_error(&err.to_string()),
        }
    }
}

fn read_field(rl: &mut DefaultEditor, prompt: &str) -> Result<Option<String>, ReadlineError> {
    loop {
        match rl.readline(prompt) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => return Ok(Some(line.trim().to_string())),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(None),
            Err(err) => return Err(err),
        }
    }
}

fn confirm(rl: &mut DefaultEditor, prompt: &str) -> bool {
    matches!(
        rl.readline(prompt).map(|s| s.trim().to_ascii_lowercase()),
        Ok(answer) if answer == "y" || answer == "yes"
    )
}

fn print_room(store: &RoomStore, renderer: &mut PlainTextRenderer) {
    renderer.print_header(&format_header(
        store.current_room().as_ref(),
        store.upload_status(),
    ));
    renderer.print_info(&format_history(&store.messages()));
}

fn print_status(store: &RoomStore, renderer: &mut PlainTextRenderer) {
    renderer.print_header(&format_header(
        store.current_room().as_ref(),
        store.upload_status(),
    ));
    println!("    Room: {:?}", store.phase());
    println!("    Messages: {}", store.messages().len());
    println!(
        "    Document: {}",
        if store.is_processing() {
            "processing"
        } else {
            "ready"
        }
    );
}

fn explain_refusal(store: &RoomStore, renderer: &mut PlainTextRenderer) {
    if store.current_room_id().is_none() {
        renderer.print_info("Open a room with /open <id> or /upload a PDF first.");
    } else if store.is_processing() {
        renderer.print_info("The document is still being analysed; try again shortly.");
    } else {
        renderer.print_info("Still waiting on the previous answer.");
    }
}

fn spawn_notice_printer(mut notices: broadcast::Receiver<Notice>, use_color: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut renderer = PlainTextRenderer::with_color(use_color);
        loop {
            match notices.recv().await {
                Ok(notice) => match notice.level {
                    NoticeLevel::Success => renderer.print_success(&notice.text),
                    NoticeLevel::Info => renderer.print_info(&notice.text),
                    NoticeLevel::Error => renderer.print_error(&notice.text),
                },
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
