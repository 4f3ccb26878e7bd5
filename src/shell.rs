//! Terminal front end: login prompt, key list, store form, consent dialog
//! and the record viewer, redrawn after every command.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::consent::ConsentState;
use crate::proxy::HttpProxy;
use crate::session::{DataMode, Session, SessionState};
use crate::viewer::{JsonViewer, ROOT_PATH};

const TITLE: &str = "Swift API Example";

const HELP: &str = "\
commands:
  login <username>         log in (any name works)
  logout
  keys                     refresh the stored key list
  toggle-keys              show/hide the key list
  get <key>                retrieve and decrypt a key
  store <key> <text>       store a string
  store-json <key> <json>  store a JSON value
  consent                  open the consent dialog
  grant | cancel           answer the consent dialog
  revoke                   revoke consent
  expand <path>            expand/collapse a node in the viewer (e.g. root.items.0)
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Login(String),
    Logout,
    RefreshKeys,
    ToggleKeys,
    Retrieve(String),
    Store {
        key: String,
        text: String,
        mode: DataMode,
    },
    OpenConsent,
    Grant,
    Cancel,
    Revoke,
    Expand(String),
    Help,
    Quit,
}

fn split_key_and_rest(rest: &str) -> Option<(String, String)> {
    let rest = rest.trim_start();
    let (key, text) = rest.split_once(char::is_whitespace)?;
    Some((key.to_string(), text.trim_start().to_string()))
}

pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let needs_arg = |what: &str| format!("usage: {} {}", word, what);

    match word {
        "login" if !rest.is_empty() => Ok(ShellCommand::Login(rest.to_string())),
        "login" => Err(needs_arg("<username>")),
        "logout" => Ok(ShellCommand::Logout),
        "keys" | "refresh" => Ok(ShellCommand::RefreshKeys),
        "toggle-keys" => Ok(ShellCommand::ToggleKeys),
        "get" if !rest.is_empty() => Ok(ShellCommand::Retrieve(rest.to_string())),
        "get" => Err(needs_arg("<key>")),
        "store" | "store-json" => {
            let mode = if word == "store-json" {
                DataMode::Json
            } else {
                DataMode::Text
            };
            split_key_and_rest(rest)
                .map(|(key, text)| ShellCommand::Store { key, text, mode })
                .ok_or_else(|| needs_arg("<key> <data>"))
        }
        "consent" => Ok(ShellCommand::OpenConsent),
        "grant" | "yes" => Ok(ShellCommand::Grant),
        "cancel" | "no" => Ok(ShellCommand::Cancel),
        "revoke" => Ok(ShellCommand::Revoke),
        "expand" | "collapse" => Ok(ShellCommand::Expand(if rest.is_empty() {
            ROOT_PATH.to_string()
        } else {
            rest.to_string()
        })),
        "help" | "?" => Ok(ShellCommand::Help),
        "quit" | "exit" => Ok(ShellCommand::Quit),
        "" => Err(String::new()),
        other => Err(format!("unknown command '{}', try 'help'", other)),
    }
}

/// Draws the whole screen for the current state.
pub fn render_screen(state: &SessionState, viewer: Option<&JsonViewer>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", TITLE);
    if let Some(error) = &state.error {
        let _ = writeln!(out, "! {}", error);
    }

    let Some(username) = &state.username else {
        if state.loading.login {
            let _ = writeln!(out, "Loading...");
        }
        let _ = writeln!(out, "Login with Username: enter `login <username>`");
        return out;
    };
    let _ = writeln!(out, "user: {}", username);

    match state.consent() {
        ConsentState::Unknown => {}
        ConsentState::Granted => {
            let _ = writeln!(out, "[✓] GDPR Consent Granted  (revoke)");
        }
        ConsentState::Denied => {
            let _ = writeln!(out, "[!] GDPR Consent Required  (consent)");
        }
    }

    if state.gate.dialog_open() {
        let _ = writeln!(out, "-- Data Processing Consent --");
        let _ = writeln!(
            out,
            "Swift Protocol securely stores your data using end-to-end encryption."
        );
        let _ = writeln!(
            out,
            "I, {}, consent to the processing of my data as described above. \
             I understand I can withdraw this consent at any time.",
            username
        );
        let _ = writeln!(out, "(grant / cancel)");
    }

    let _ = writeln!(
        out,
        "Stored Data Keys [{}]",
        if state.keys_expanded { "−" } else { "+" }
    );
    if state.keys_expanded {
        if state.loading.keys {
            let _ = writeln!(out, "  Loading keys...");
        } else if state.keys.is_empty() {
            let _ = writeln!(out, "  No data keys found. Store some data to create keys");
        } else {
            for key in &state.keys {
                let mark = if state.selected_key.as_deref() == Some(key) {
                    '>'
                } else {
                    ' '
                };
                let _ = writeln!(out, " {} {}", mark, key);
            }
        }
    }

    if state.loading.store {
        let _ = writeln!(out, "Storing data...");
    }
    if let Some(json_error) = &state.json_error {
        let _ = writeln!(out, "  data: {}", json_error);
    }

    if let Some(key) = &state.selected_key {
        let _ = writeln!(out, "-- {} --", key);
        if state.loading.retrieve {
            let _ = writeln!(out, "Retrieving data...");
        } else if let Some(record) = &state.record {
            let _ = writeln!(out, "version {}", record.version);
            match (&record.data, viewer) {
                (Value::String(text), _) => {
                    let _ = writeln!(out, "{}", text);
                }
                (Value::Bool(_) | Value::Number(_), _) => {
                    let _ = writeln!(out, "{}", record.data);
                }
                (_, Some(viewer)) => out.push_str(&viewer.render()),
                (_, None) => {}
            }
            if !record.metadata.is_empty() {
                let _ = writeln!(out, "metadata:");
                let metadata = JsonViewer::new(Value::Object(record.metadata.clone()), true);
                out.push_str(&metadata.render());
            }
        }
    }
    out
}

/// Viewer for the displayed record and the retrieval it came from.
struct RecordView {
    retrieval: u64,
    data: JsonViewer,
}

/// Keeps the viewer in step with the displayed record. A new retrieval
/// always starts from fresh expansion state.
fn sync_viewer(view: &mut Option<RecordView>, state: &SessionState) {
    let Some(record) = &state.record else {
        *view = None;
        return;
    };
    match view {
        Some(v) if v.retrieval == state.retrievals => v.data.set_root(record.data.clone()),
        stale => {
            *stale = Some(RecordView {
                retrieval: state.retrievals,
                data: JsonViewer::new(record.data.clone(), true),
            })
        }
    }
}

async fn apply(session: &Session, view: &mut Option<RecordView>, command: ShellCommand) {
    match command {
        ShellCommand::Login(name) => {
            session.login(&name).await;
        }
        ShellCommand::Logout => session.logout(),
        ShellCommand::RefreshKeys => session.load_user_keys().await,
        ShellCommand::ToggleKeys => session.toggle_keys_expanded(),
        ShellCommand::Retrieve(key) => session.retrieve(&key).await,
        ShellCommand::Store { key, text, mode } => session.store(&key, &text, mode).await,
        ShellCommand::OpenConsent => session.open_consent_dialog(),
        ShellCommand::Grant => session.grant_consent().await,
        ShellCommand::Cancel => session.cancel_consent(),
        ShellCommand::Revoke => session.revoke_consent().await,
        ShellCommand::Expand(path) => {
            if let Some(v) = view.as_mut() {
                v.data.toggle(&path);
            }
        }
        ShellCommand::Help | ShellCommand::Quit => {}
    }
}

pub async fn run(server: &str) -> Result<()> {
    let session = Session::new(Arc::new(HttpProxy::new(server)));
    let mut view: Option<RecordView> = None;
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();

    log::info!("shell connected to {}", server);
    stdout
        .write_all(render_screen(&session.snapshot(), None).as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(usage) => {
                if !usage.is_empty() {
                    stdout.write_all(format!("{}\n", usage).as_bytes()).await?;
                }
                continue;
            }
        };
        match command {
            ShellCommand::Quit => break,
            ShellCommand::Help => {
                stdout.write_all(format!("{}\n", HELP).as_bytes()).await?;
                continue;
            }
            command => apply(&session, &mut view, command).await,
        }

        let state = session.snapshot();
        sync_viewer(&mut view, &state);
        let viewer = view.as_ref().map(|v| &v.data);
        stdout
            .write_all(render_screen(&state, viewer).as_bytes())
            .await?;
    }
    Ok(())
}
