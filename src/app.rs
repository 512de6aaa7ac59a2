use std::collections::HashMap;
use std::path::PathBuf;
use ratatui::text::Line;

use crate::controller::{Completion, ConversationController};

/// How many ticks a notice stays in the footer (~3 seconds)
const NOTICE_TICKS: u8 = 10;

pub const HELP_TEXT: &str =
    "@imagine <prompt> draws an image, /photo <path> labels a photo, /clear, /quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Slash commands typed into the input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Photo(PathBuf),
    Clear,
    Quit,
    Help,
    /// Anything else goes to the controller as chat text
    Text(String),
}

impl Command {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.split_once(char::is_whitespace) {
            Some(("/photo", path)) if !path.trim().is_empty() => {
                Command::Photo(expand_home(path.trim()))
            }
            _ => match trimmed {
                "/clear" => Command::Clear,
                "/quit" | "/exit" => Command::Quit,
                "/help" | "/photo" => Command::Help,
                _ => Command::Text(input.to_string()),
            },
        }
    }
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// A transient footer message
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    ticks_left: u8,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input line
    pub input: String,
    pub cursor: usize, // cursor position in chars

    // Conversation
    pub controller: ConversationController,
    pub model_label: String,

    // Chat pane scroll state
    pub scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16,     // inner height, updated during render
    pub chat_total_lines: u16, // wrapped line count, updated during render

    // Typing animation, 0-2
    pub animation_frame: u8,

    pub notice: Option<Notice>,

    /// Rendered thumbnails by image path; `None` when the file can't be shown
    pub thumbnails: HashMap<String, Option<Vec<Line<'static>>>>,
}

impl App {
    pub fn new(controller: ConversationController, model_label: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            input: String::new(),
            cursor: 0,
            controller,
            model_label: model_label.into(),
            scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            chat_total_lines: 0,
            animation_frame: 0,
            notice: None,
            thumbnails: HashMap::new(),
        }
    }

    /// Enter on the input line
    pub fn submit_input(&mut self) {
        let input = std::mem::take(&mut self.input);
        self.cursor = 0;

        match Command::parse(&input) {
            Command::Photo(path) => {
                self.controller.submit_user_image(path);
                self.show_notice("Labelling photo...");
            }
            Command::Clear => {
                self.controller.clear();
                self.thumbnails.clear();
                self.scroll = 0;
                self.follow_bottom = true;
            }
            Command::Quit => self.should_quit = true,
            Command::Help => self.show_notice(HELP_TEXT),
            Command::Text(text) => {
                if self.controller.submit_user_text(&text) {
                    self.scroll_to_bottom();
                } else {
                    // Keep what was typed; blank input is a no-op
                    self.input = input;
                    self.cursor = self.input.chars().count();
                }
            }
        }
    }

    pub fn apply_completion(&mut self, completion: Completion) {
        let appends = !matches!(completion, Completion::Notice(_));
        self.controller.apply(completion);

        while let Some(notice) = self.controller.take_notice() {
            self.show_notice(notice);
        }
        if appends {
            self.scroll_to_bottom();
        }
    }

    pub fn show_notice(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            ticks_left: NOTICE_TICKS,
        });
    }

    /// Tick animation frame and expire notices
    pub fn tick(&mut self) {
        if self.controller.pending() > 0 {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        if let Some(notice) = &mut self.notice {
            notice.ticks_left = notice.ticks_left.saturating_sub(1);
            if notice.ticks_left == 0 {
                self.notice = None;
            }
        }
    }

    /// Pin the view to the newest message; resolved against real sizes on the next render
    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
    }

    pub fn max_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        if self.follow_bottom {
            self.scroll = self.max_scroll();
            self.follow_bottom = false;
        }
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll());
        if self.scroll >= self.max_scroll() {
            self.follow_bottom = true;
        }
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }
}
