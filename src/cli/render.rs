//! Terminal presenter for stream events.
//!
//! `tool_call` events that share a `call_id` update one row. On an interactive terminal rows
//! without a result live in a block at the bottom of the output that is erased and redrawn on
//! every change; a row leaves the block once, together with its result. Otherwise each row is
//! printed once, together with its result.

use std::io::{self, Write};

use crossterm::cursor::MoveToPreviousLine;
use crossterm::style::{Color, Print, ResetColor, SetAttribute, Attribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use serde_json::Value;

use crate::stream::{
    classify, detect_content_type, format_tool_compact, format_tree_output, truncate, ContentType,
    DisplayLimits, StreamEvent,
};

const RESULT_PREVIEW_LINES: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolRowResult {
    pub ok: bool,
    pub content: String,
}

/// Display state of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRow {
    pub call_id: String,
    pub name: String,
    pub args: Value,
    pub args_complete: bool,
    pub result: Option<ToolRowResult>,
}

impl ToolRow {
    pub fn label(&self) -> String {
        format_tool_compact(&self.name, &self.args)
    }
}

/// What an applied event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Thinking,
    Text,
    RowAdded(usize),
    RowUpdated(usize),
    RowResulted(usize),
    Done,
    Error,
}

/// Everything shown for one turn, with tool rows keyed by `call_id`.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    rows: Vec<ToolRow>,
    thinking: String,
    text: String,
    errors: Vec<String>,
    done: bool,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &StreamEvent) -> StateChange {
        match event {
            StreamEvent::Thinking { content } => {
                self.thinking.push_str(content);
                StateChange::Thinking
            }
            StreamEvent::Text { content } => {
                self.text.push_str(content);
                StateChange::Text
            }
            StreamEvent::ToolCall {
                call_id,
                name,
                args,
                args_complete,
            } => match self.position(call_id) {
                Some(index) => {
                    let row = &mut self.rows[index];
                    if !name.is_empty() {
                        row.name = name.clone();
                    }
                    row.args = args.clone();
                    row.args_complete = *args_complete;
                    StateChange::RowUpdated(index)
                }
                None => {
                    self.rows.push(ToolRow {
                        call_id: call_id.clone(),
                        name: name.clone(),
                        args: args.clone(),
                        args_complete: *args_complete,
                        result: None,
                    });
                    StateChange::RowAdded(self.rows.len() - 1)
                }
            },
            StreamEvent::ToolResult {
                call_id,
                name,
                content,
                ok,
            } => {
                let index = self.position(call_id).unwrap_or_else(|| {
                    self.rows.push(ToolRow {
                        call_id: call_id.clone(),
                        name: name.clone(),
                        args: Value::Object(Default::default()),
                        args_complete: true,
                        result: None,
                    });
                    self.rows.len() - 1
                });
                self.rows[index].result = Some(ToolRowResult {
                    ok: *ok,
                    content: content.clone(),
                });
                StateChange::RowResulted(index)
            }
            StreamEvent::Done { final_response } => {
                if self.text.is_empty() {
                    self.text = final_response.clone();
                }
                self.done = true;
                StateChange::Done
            }
            StreamEvent::Error { message } => {
                self.errors.push(message.clone());
                StateChange::Error
            }
        }
    }

    fn position(&self, call_id: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.call_id == call_id)
    }

    pub fn rows(&self) -> &[ToolRow] {
        &self.rows
    }

    pub fn row(&self, call_id: &str) -> Option<&ToolRow> {
        self.position(call_id).map(|index| &self.rows[index])
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Thinking,
    Text,
}

/// Writes a turn to a terminal (or any writer).
pub struct TerminalRenderer<W: Write> {
    out: W,
    state: StreamState,
    interactive: bool,
    show_thinking: bool,
    live: Vec<usize>,
    live_lines: u16,
    section: Section,
    at_line_start: bool,
}

impl<W: Write> TerminalRenderer<W> {
    /// `interactive` enables colours and in-place row updates.
    pub fn new(out: W, interactive: bool) -> Self {
        Self {
            out,
            state: StreamState::new(),
            interactive,
            show_thinking: true,
            live: Vec::new(),
            live_lines: 0,
            section: Section::None,
            at_line_start: true,
        }
    }

    pub fn with_thinking(mut self, show_thinking: bool) -> Self {
        self.show_thinking = show_thinking;
        self
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn handle(&mut self, event: &StreamEvent) -> io::Result<()> {
        match (self.state.apply(event), event) {
            (StateChange::Thinking, StreamEvent::Thinking { content }) => {
                if self.show_thinking {
                    self.erase_live()?;
                    if self.section != Section::Thinking {
                        self.break_line()?;
                        self.paint(Color::DarkGrey, "thinking: ")?;
                        self.section = Section::Thinking;
                    }
                    self.write_dim(&truncate(content, DisplayLimits::THINKING_STREAM))?;
                }
            }
            (StateChange::Text, StreamEvent::Text { content }) => {
                self.erase_live()?;
                if self.section != Section::Text {
                    self.break_line()?;
                    self.section = Section::Text;
                }
                self.write_text(content)?;
            }
            (StateChange::RowAdded(index), _) => {
                if self.interactive {
                    self.live.push(index);
                    self.redraw_live()?;
                }
            }
            (StateChange::RowUpdated(index), _) => {
                if self.interactive && self.live.contains(&index) {
                    self.redraw_live()?;
                }
            }
            (StateChange::RowResulted(index), _) => {
                self.erase_live()?;
                self.live.retain(|&live| live != index);
                self.break_line()?;
                self.draw_row(index)?;
                self.draw_result(index)?;
                self.draw_live()?;
            }
            (StateChange::Error, StreamEvent::Error { message }) => {
                self.erase_live()?;
                self.break_line()?;
                self.paint(Color::Red, &format!("error: {message}"))?;
                self.write_text("\n")?;
                self.draw_live()?;
            }
            (StateChange::Done, _) => {
                // Calls still without a result keep their last drawn line.
                self.live.clear();
                self.live_lines = 0;
                self.break_line()?;
            }
            _ => {}
        }
        self.out.flush()
    }

    fn redraw_live(&mut self) -> io::Result<()> {
        self.erase_live()?;
        self.draw_live()
    }

    fn erase_live(&mut self) -> io::Result<()> {
        if self.live_lines > 0 {
            queue!(
                self.out,
                MoveToPreviousLine(self.live_lines),
                Clear(ClearType::FromCursorDown)
            )?;
            self.live_lines = 0;
            self.at_line_start = true;
        }
        Ok(())
    }

    fn draw_live(&mut self) -> io::Result<()> {
        if self.live.is_empty() {
            return Ok(());
        }
        self.break_line()?;
        for index in self.live.clone() {
            self.draw_row(index)?;
            self.write_text("\n")?;
            self.live_lines = self.live_lines.saturating_add(1);
        }
        Ok(())
    }

    fn draw_row(&mut self, index: usize) -> io::Result<()> {
        let row = &self.state.rows[index];
        let (color, marker) = match (&row.result, row.args_complete) {
            (Some(result), _) if result.ok => (Color::Green, "●"),
            (Some(_), _) => (Color::Red, "●"),
            (None, true) => (Color::Cyan, "●"),
            (None, false) => (Color::Yellow, "○"),
        };
        let label = row.label();
        let pending = row.result.is_none() && !row.args_complete;

        self.paint(color, marker)?;
        self.write_text(&format!(" {label}"))?;
        if pending {
            self.paint(Color::DarkGrey, " (in progress)")?;
        }
        self.section = Section::None;
        Ok(())
    }

    fn draw_result(&mut self, index: usize) -> io::Result<()> {
        let Some(result) = self.state.rows[index].result.clone() else {
            return Ok(());
        };
        let summary = truncate(
            &classify(&result.content).summary,
            DisplayLimits::TOOL_RESULT_STREAM,
        );
        let lines: Vec<&str> = summary.lines().collect();
        self.write_text("\n")?;
        if !lines.is_empty() {
            let tree = format_tree_output(&lines, RESULT_PREVIEW_LINES, "  ");
            if !result.ok || detect_content_type(&result.content) == ContentType::Error {
                self.paint(Color::Red, &tree)?;
            } else {
                self.write_dim(&tree)?;
            }
            self.write_text("\n")?;
        }
        Ok(())
    }

    fn break_line(&mut self) -> io::Result<()> {
        if !self.at_line_start {
            self.write_text("\n")?;
        }
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        queue!(self.out, Print(text))?;
        self.at_line_start = text.ends_with('\n');
        Ok(())
    }

    fn paint(&mut self, color: Color, text: &str) -> io::Result<()> {
        if self.interactive {
            queue!(self.out, SetForegroundColor(color))?;
            self.write_text(text)?;
            queue!(self.out, ResetColor)
        } else {
            self.write_text(text)
        }
    }

    fn write_dim(&mut self, text: &str) -> io::Result<()> {
        if self.interactive {
            queue!(self.out, SetAttribute(Attribute::Dim))?;
            self.write_text(text)?;
            queue!(self.out, SetAttribute(Attribute::Reset))
        } else {
            self.write_text(text)
        }
    }
}
