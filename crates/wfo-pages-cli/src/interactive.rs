//! Interactive taxon search.
//!
//! Typed lines are search text and go through the [`Debouncer`]; a search
//! runs once input has been quiet for [`crate::search::DEBOUNCE`]. Lines
//! starting with `:` are commands and run immediately.
//!
//! Input is read on its own thread (rustyline by default, plain stdin behind
//! `--no-default-features`) and forwarded over a channel, so the main loop can
//! wait on "next line or debounce deadline, whichever comes first".

use crate::pages::{ensure_root_ok, print_page, print_report, Workspace};
use crate::search::{Debouncer, SearchView};
use anyhow::{anyhow, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Instant;

const PROMPT: &str = "wfo> ";

enum InputEvent {
    Line(String),
    Eof,
}

#[derive(Debug, PartialEq, Eq)]
enum ReplControl {
    Continue,
    Exit,
}

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Add { number: usize, force: bool },
    Help,
    Quit,
}

pub fn cmd_interactive(vault: &Path) -> Result<()> {
    let mut ws = Workspace::open(vault)?;

    println!("{}", "WFO Pages".green().bold());
    println!(
        "classification {} · {}",
        ws.settings.classification_version,
        ws.settings.api_url.dimmed()
    );
    println!("Type a name to search. `:help` for commands.\n");

    let (tx, rx) = mpsc::channel();
    spawn_reader(tx);
    run_loop(&mut ws, &rx)
}

fn run_loop(ws: &mut Workspace, rx: &Receiver<InputEvent>) -> Result<()> {
    let mut debouncer = Debouncer::default();
    let mut view = SearchView::default();

    loop {
        let event = match debouncer.deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => Some(InputEvent::Eof),
                }
            }
            None => Some(rx.recv().unwrap_or(InputEvent::Eof)),
        };

        match event {
            None => {
                if let Some(query) = debouncer.poll(Instant::now()) {
                    run_search(ws, &mut view, &query);
                }
            }
            Some(InputEvent::Line(line)) => {
                let line = line.trim();
                if line.starts_with(':') {
                    match parse_command(line).and_then(|cmd| dispatch(ws, &view, cmd)) {
                        Ok(ReplControl::Continue) => {}
                        Ok(ReplControl::Exit) => break,
                        Err(e) => eprintln!("{} {e}", "error:".red().bold()),
                    }
                } else if !line.is_empty() {
                    debouncer.input(line, Instant::now());
                }
            }
            Some(InputEvent::Eof) => {
                // Piped input: settle whatever was typed last.
                if let Some(query) = debouncer.flush() {
                    run_search(ws, &mut view, &query);
                }
                break;
            }
        }
    }
    Ok(())
}

fn run_search(ws: &Workspace, view: &mut SearchView, query: &str) {
    match view.run(ws.lookup(), query) {
        Ok(0) => println!("{}", format!("no names match `{query}`").dimmed()),
        Ok(_) => {}
        Err(e) => eprintln!("{} search failed: {e}", "error:".red().bold()),
    }
}

fn parse_command(line: &str) -> Result<ReplCommand> {
    let mut parts = line.trim_start_matches(':').split_whitespace();
    let cmd = parts.next().unwrap_or_default();
    let number = |arg: Option<&str>| -> Result<usize> {
        let arg = arg.ok_or_else(|| anyhow!("usage: :{cmd} <result number>"))?;
        arg.parse::<usize>()
            .map_err(|_| anyhow!("`{arg}` is not a result number"))
    };
    match cmd {
        "add" | "a" => Ok(ReplCommand::Add {
            number: number(parts.next())?,
            force: false,
        }),
        "force" | "f" => Ok(ReplCommand::Add {
            number: number(parts.next())?,
            force: true,
        }),
        "help" | "h" | "?" => Ok(ReplCommand::Help),
        "quit" | "q" | "exit" => Ok(ReplCommand::Quit),
        other => Err(anyhow!("unknown command `:{other}` (try :help)")),
    }
}

fn dispatch(ws: &mut Workspace, view: &SearchView, cmd: ReplCommand) -> Result<ReplControl> {
    match cmd {
        ReplCommand::Add { number, force } => {
            let request = view.add_target(number, force)?;
            let report = ws.sync(request.clone());
            print_report(ws.store.vault_root(), &report);
            ensure_root_ok(&request, &report)?;
            print_page(&ws.store.page_path(&request.plain_name))?;
        }
        ReplCommand::Help => print_help(view),
        ReplCommand::Quit => return Ok(ReplControl::Exit),
    }
    Ok(ReplControl::Continue)
}

fn print_help(view: &SearchView) {
    println!("{}", "Commands".bold());
    println!("  <text>       search names (at least 3 characters)");
    println!("  :add N       add the page for result N (synonyms add their accepted name)");
    println!("  :force N     like :add, re-fetching pages that already exist");
    println!("  :help        show this help");
    println!("  :quit        leave");
    if let Some(query) = view.query() {
        println!(
            "{}",
            format!("last search: `{query}`, {} result(s)", view.entries().len()).dimmed()
        );
    }
}

#[cfg(feature = "repl-rustyline")]
fn spawn_reader(tx: Sender<InputEvent>) {
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                tracing::error!("failed to initialize line editor: {e}");
                let _ = tx.send(InputEvent::Eof);
                return;
            }
        };
        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    if tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    let _ = tx.send(InputEvent::Eof);
                    break;
                }
                Err(e) => {
                    tracing::error!("input error: {e}");
                    let _ = tx.send(InputEvent::Eof);
                    break;
                }
            }
        }
    });
}

#[cfg(not(feature = "repl-rustyline"))]
fn spawn_reader(tx: Sender<InputEvent>) {
    use std::io::{self, BufRead, Write};

    thread::spawn(move || {
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print!("{PROMPT}");
            let _ = io::stdout().flush();
            match lines.next() {
                Some(Ok(line)) => {
                    if tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("input error: {e}");
                    let _ = tx.send(InputEvent::Eof);
                    break;
                }
                None => {
                    let _ = tx.send(InputEvent::Eof);
                    break;
                }
            }
        }
    });
}
