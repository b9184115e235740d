//! Interpretation of inbound payloads.
//!
//! Two wire conventions exist and exactly one is active per session:
//!
//! - [`WireConvention::Verb`]: the host sends `cmd<verb> <argument>` for
//!   structured commands (`print`, `ret`, `break`, `resume`, `quit`);
//!   anything whose first token lacks the `cmd` marker is plain output.
//! - [`WireConvention::LocalDirective`]: payloads beginning with `$(` are
//!   prompt directives (`$(Prompt)`, `$(PromptDebug)`) applied on the
//!   client; everything else is plain output.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ConsoleError, Result};
use crate::session::{BreakLocation, Session, SessionEvent};
use crate::view::ConsoleView;

/// Prefix that marks the first token of a structured command.
pub const VERB_MARKER: &str = "cmd";

/// Prefix of a local prompt directive.
pub const DIRECTIVE_MARKER: &str = "$(";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireConvention {
    #[default]
    Verb,
    LocalDirective,
}

impl FromStr for WireConvention {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "verb" => Ok(WireConvention::Verb),
            "local_directive" | "local-directive" => Ok(WireConvention::LocalDirective),
            other => Err(format!(
                "unknown wire convention '{other}' (expected 'verb' or 'local_directive')"
            )),
        }
    }
}

/// The closed set of structured commands a host may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Show the argument as output.
    Print,
    /// Command result; `ok` means "no output".
    Ret,
    /// Execution suspended at `<file>,<line>`.
    Break,
    /// Execution resumed.
    Resume,
    /// The host is closing the session.
    Quit,
}

impl Verb {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "print" => Some(Verb::Print),
            "ret" => Some(Verb::Ret),
            "break" => Some(Verb::Break),
            "resume" => Some(Verb::Resume),
            "quit" => Some(Verb::Quit),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Verb::Print => "print",
            Verb::Ret => "ret",
            Verb::Break => "break",
            Verb::Resume => "resume",
            Verb::Quit => "quit",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Client-side prompt switches of the directive convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `$(Prompt)`: back to the idle prompt.
    Prompt,
    /// `$(PromptDebug)`: switch to the break prompt.
    PromptDebug,
}

impl Directive {
    /// Parse a trimmed `$(...)` directive.
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "$(Prompt)" => Ok(Directive::Prompt),
            "$(PromptDebug)" => Ok(Directive::PromptDebug),
            other => Err(ConsoleError::MalformedCommand(format!(
                "unknown directive '{other}'"
            ))),
        }
    }
}

/// A classified inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Plain(String),
    Structured { verb: Verb, arg: String },
    Directive(Directive),
}

/// What the connection should do after a payload was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The host asked to end the session.
    Close,
}

/// Decide whether `payload` is plain output or carries a command.
pub fn classify(payload: &str, convention: WireConvention) -> Result<Inbound> {
    match convention {
        WireConvention::Verb => {
            let line = payload.trim_end_matches(['\r', '\n']);
            let (head, arg) = line
                .split_once(char::is_whitespace)
                .map(|(head, arg)| (head, arg.trim_start()))
                .unwrap_or((line, ""));
            match head.strip_prefix(VERB_MARKER) {
                Some(name) => match Verb::from_name(name) {
                    Some(verb) => Ok(Inbound::Structured {
                        verb,
                        arg: arg.to_string(),
                    }),
                    None => Err(ConsoleError::MalformedCommand(format!(
                        "unknown command '{name}'"
                    ))),
                },
                None => Ok(Inbound::Plain(payload.to_string())),
            }
        }
        WireConvention::LocalDirective => {
            let trimmed = payload.trim();
            if trimmed.starts_with(DIRECTIVE_MARKER) {
                Directive::parse(trimmed).map(Inbound::Directive)
            } else {
                Ok(Inbound::Plain(payload.to_string()))
            }
        }
    }
}

/// Parse a `break` argument: exactly `<file>,<line>`.
pub fn parse_break(arg: &str) -> Result<BreakLocation> {
    let fields: Vec<&str> = arg.split(',').collect();
    let [file, line] = fields.as_slice() else {
        return Err(ConsoleError::MalformedCommand(format!(
            "break expects '<file>,<line>', got '{arg}'"
        )));
    };
    let line = line.trim().parse::<u32>().map_err(|_| {
        ConsoleError::MalformedCommand(format!("break line is not a number: '{}'", line.trim()))
    })?;
    Ok(BreakLocation::new(file.trim(), line))
}

/// Prompt texts shown in each prompt mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub idle: String,
    pub brk: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            idle: "slua> ".to_string(),
            brk: "ldb> ".to_string(),
        }
    }
}

/// Routes classified payloads to their handlers.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    convention: WireConvention,
    prompts: Prompts,
}

impl Dispatcher {
    pub fn new(convention: WireConvention, prompts: Prompts) -> Self {
        Self {
            convention,
            prompts,
        }
    }

    pub fn convention(&self) -> WireConvention {
        self.convention
    }

    /// Classify and dispatch one inbound payload.
    pub fn handle<V: ConsoleView + ?Sized>(
        &self,
        payload: &str,
        session: &mut Session,
        view: &mut V,
    ) -> Result<Flow> {
        let inbound = classify(payload, self.convention)?;
        self.dispatch(inbound, session, view)
    }

    /// Run the handler for `inbound`. On error nothing has been shown and
    /// the session is unchanged.
    pub fn dispatch<V: ConsoleView + ?Sized>(
        &self,
        inbound: Inbound,
        session: &mut Session,
        view: &mut V,
    ) -> Result<Flow> {
        match inbound {
            Inbound::Plain(text) => {
                view.replace_current_line(&text);
                view.show_prompt();
            }
            Inbound::Structured { verb, arg } => return self.run_verb(verb, &arg, session, view),
            Inbound::Directive(directive) => self.apply_directive(directive, session, view)?,
        }
        Ok(Flow::Continue)
    }

    fn run_verb<V: ConsoleView + ?Sized>(
        &self,
        verb: Verb,
        arg: &str,
        session: &mut Session,
        view: &mut V,
    ) -> Result<Flow> {
        tracing::trace!(%verb, arg, "dispatching host command");
        match verb {
            Verb::Print => {
                view.append_line(arg);
                view.show_prompt();
            }
            Verb::Ret => {
                if arg.trim() != "ok" {
                    view.append_line(arg);
                }
                view.show_prompt();
            }
            Verb::Break => {
                let location = parse_break(arg)?;
                let line = format!("Break at {location}");
                session.apply(SessionEvent::Break(Some(location)))?;
                view.set_prompt_text(&self.prompts.brk);
                view.append_line(&line);
                view.show_prompt();
            }
            Verb::Resume => {
                session.apply(SessionEvent::Resume)?;
                view.set_prompt_text(&self.prompts.idle);
                view.show_prompt();
            }
            Verb::Quit => {
                view.append_line("Host closed the session");
                view.show_prompt();
                return Ok(Flow::Close);
            }
        }
        Ok(Flow::Continue)
    }

    /// Apply a prompt directive. Works while disconnected too, in which
    /// case only the prompt text changes.
    pub fn apply_directive<V: ConsoleView + ?Sized>(
        &self,
        directive: Directive,
        session: &mut Session,
        view: &mut V,
    ) -> Result<()> {
        let (event, prompt) = match directive {
            Directive::Prompt => (SessionEvent::Resume, &self.prompts.idle),
            Directive::PromptDebug => (SessionEvent::Break(None), &self.prompts.brk),
        };
        if session.is_connected() {
            session.apply(event)?;
        }
        view.set_prompt_text(prompt);
        view.show_prompt();
        Ok(())
    }
}
