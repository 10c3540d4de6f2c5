use super::message::Message;

/// What the console shows below the header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Panel {
    #[default]
    Channels,
    Conversation,
    Search {
        query: String,
        results: Vec<Message>,
    },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellState {
    running: bool,
    panel: Panel,
    notices: Vec<String>,
    redraw: bool,
}

impl Default for ShellState {
    fn default() -> Self {
        Self {
            running: true,
            panel: Panel::default(),
            notices: Vec::new(),
            redraw: true,
        }
    }
}

impl ShellState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn set_panel(&mut self, panel: Panel) {
        self.panel = panel;
        self.redraw = true;
    }

    /// Queues a one-shot line for the next frame.
    pub fn push_notice(&mut self, notice: impl Into<String>) {
        self.notices.push(notice.into());
        self.redraw = true;
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    /// True once per batch of changes since the last call.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_is_always_drawn() {
        let mut state = ShellState::default();

        assert!(state.take_redraw());
        assert!(!state.take_redraw());
    }

    #[test]
    fn notices_are_drained_once_and_trigger_redraw() {
        let mut state = ShellState::default();
        state.take_redraw();

        state.push_notice("sent");

        assert!(state.take_redraw());
        assert_eq!(state.take_notices(), vec!["sent".to_owned()]);
        assert!(state.take_notices().is_empty());
    }
}
