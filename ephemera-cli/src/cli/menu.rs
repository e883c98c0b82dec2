//! Interactive numbered menu, shown when no subcommand is given.

use ephemera_core::LifecycleOrchestrator;
use std::io::{self, BufRead, Write};

use super::actions;
use crate::catalog::{self, Architecture};

const MENU: &str = "\
1) List tools
2) Run a tool
3) Run all tools
4) Sweep leftover workspaces
q) Quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    List,
    /// Run a tool; carries the id or number if given on the same line.
    Run(Option<String>),
    RunAll,
    Sweep,
    Quit,
}

/// Parses one line of menu input. Accepts the number or a word, and an
/// optional tool after "2"/"run".
pub fn parse_choice(line: &str) -> Option<MenuChoice> {
    let mut words = line.split_whitespace();
    let first = words.next()?.to_ascii_lowercase();
    let rest = words.next().map(str::to_string);

    let choice = match first.as_str() {
        "1" | "list" | "l" => MenuChoice::List,
        "2" | "run" | "r" => MenuChoice::Run(rest),
        "3" | "all" | "run-all" => MenuChoice::RunAll,
        "4" | "sweep" | "s" => MenuChoice::Sweep,
        "q" | "quit" | "exit" => MenuChoice::Quit,
        _ => return None,
    };
    Some(choice)
}

/// Resolves a tool selection given as a 1-based catalog number or an id.
fn resolve_tool(selection: &str) -> Option<&'static str> {
    let entries = catalog::all_entries();
    match selection.trim().parse::<usize>() {
        Ok(n) if n >= 1 => entries.get(n - 1).map(|e| e.id),
        Ok(_) => None,
        Err(_) => catalog::find_entry(selection).map(|e| e.id),
    }
}

pub struct Menu<'a> {
    orchestrator: &'a LifecycleOrchestrator,
    arch: Architecture,
}

impl<'a> Menu<'a> {
    pub fn new(orchestrator: &'a LifecycleOrchestrator, arch: Architecture) -> Self {
        Self { orchestrator, arch }
    }

    /// Reads choices from `input` until quit or end of input.
    pub async fn run<R: BufRead>(&self, input: &mut R, out: &mut dyn Write) -> io::Result<()> {
        loop {
            writeln!(out, "\n{}", MENU)?;
            let Some(line) = prompt(input, out, "> ")? else {
                break;
            };

            match parse_choice(&line) {
                Some(MenuChoice::List) => actions::list(out, self.arch)?,
                Some(MenuChoice::Run(selection)) => {
                    let selection = match selection {
                        Some(s) => s,
                        None => {
                            actions::list(out, self.arch)?;
                            match prompt(input, out, "Tool (number or id): ")? {
                                Some(s) => s,
                                None => break,
                            }
                        }
                    };
                    match resolve_tool(&selection) {
                        Some(id) => {
                            actions::run_tool(self.orchestrator, self.arch, id, out).await?
                        }
                        None => writeln!(out, "Unknown tool '{}'", selection.trim())?,
                    }
                }
                Some(MenuChoice::RunAll) => {
                    actions::run_all(self.orchestrator, self.arch, out).await?
                }
                Some(MenuChoice::Sweep) => actions::sweep(self.orchestrator, out)?,
                Some(MenuChoice::Quit) => break,
                None if line.trim().is_empty() => {}
                None => writeln!(out, "Unknown choice '{}'", line.trim())?,
            }
        }

        writeln!(out, "Bye.")
    }
}

/// Writes `text`, then reads one line. `None` on end of input.
fn prompt<R: BufRead>(input: &mut R, out: &mut dyn Write, text: &str) -> io::Result<Option<String>> {
    write!(out, "{}", text)?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end().to_string()))
}
