//! Display boundary between the console core and whatever renders it.
//!
//! The core never draws anything itself. It emits display directives
//! through [`ConsoleView`]; a terminal, a GUI widget or a test recorder
//! decides what they look like.

use std::sync::Arc;

use parking_lot::Mutex;

/// Presentation callbacks. None of them may fail the protocol.
pub trait ConsoleView {
    /// Show `text` as a new line of output.
    fn append_line(&mut self, text: &str);

    /// Replace the line currently being built (the pending input line).
    fn replace_current_line(&mut self, text: &str);

    /// Output is complete; show the prompt and accept input again.
    fn show_prompt(&mut self);

    /// Change the prompt text used from now on.
    fn set_prompt_text(&mut self, text: &str);
}

/// One display directive, as recorded by the test views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    AppendLine(String),
    ReplaceCurrentLine(String),
    ShowPrompt,
    SetPromptText(String),
}

impl ConsoleView for Vec<Effect> {
    fn append_line(&mut self, text: &str) {
        self.push(Effect::AppendLine(text.to_string()));
    }

    fn replace_current_line(&mut self, text: &str) {
        self.push(Effect::ReplaceCurrentLine(text.to_string()));
    }

    fn show_prompt(&mut self) {
        self.push(Effect::ShowPrompt);
    }

    fn set_prompt_text(&mut self, text: &str) {
        self.push(Effect::SetPromptText(text.to_string()));
    }
}

/// A cloneable recorder for views that live inside a spawned console task.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    effects: Arc<Mutex<Vec<Effect>>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn effects(&self) -> Vec<Effect> {
        self.effects.lock().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.effects.lock())
    }

    /// All text shown through `append_line` or `replace_current_line`.
    pub fn lines(&self) -> Vec<String> {
        self.effects
            .lock()
            .iter()
            .filter_map(|e| match e {
                Effect::AppendLine(t) | Effect::ReplaceCurrentLine(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ConsoleView for RecordingView {
    fn append_line(&mut self, text: &str) {
        self.effects.lock().append_line(text);
    }

    fn replace_current_line(&mut self, text: &str) {
        self.effects.lock().replace_current_line(text);
    }

    fn show_prompt(&mut self) {
        self.effects.lock().show_prompt();
    }

    fn set_prompt_text(&mut self, text: &str) {
        self.effects.lock().set_prompt_text(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_view_is_shared_between_clones() {
        let view = RecordingView::new();
        let mut writer = view.clone();
        writer.append_line("Break at main.lua:42");
        writer.show_prompt();

        assert_eq!(
            view.effects(),
            vec![
                Effect::AppendLine("Break at main.lua:42".into()),
                Effect::ShowPrompt
            ]
        );
        assert_eq!(view.lines(), vec!["Break at main.lua:42".to_string()]);
        assert_eq!(view.take().len(), 2);
        assert!(view.effects().is_empty());
    }
}
