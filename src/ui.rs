//! Full-screen `ratatui` front-end for the interview session.

use crate::config::read_case_file;
use crate::log_debug;
use crate::render::{render, DisplayBlock, Span as TextSpan};
use crate::screen::ConversationScreen;
use crate::service::{ConversationService, Message, Role, StartRequest};
use crate::terminal_restore::TerminalRestoreGuard;
use crate::turn::SessionPhase;
use crate::voice::VoiceDevices;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
    Terminal,
};
use std::io;
use std::path::Path;
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

const ACCENT: Color = Color::Rgb(90, 170, 255);
const TITLE: Color = Color::Rgb(120, 190, 255);
const DIM: Color = Color::Rgb(90, 110, 130);
const BODY: Color = Color::Rgb(210, 210, 205);
const INPUT: Color = Color::Rgb(255, 220, 100);
const NOTICE: Color = Color::Rgb(255, 120, 110);

/// Screen state plus the bits of UI that are not part of the session (input, scroll).
pub struct InterviewApp<S: ConversationService + 'static, D: VoiceDevices> {
    screen: ConversationScreen<S, D>,
    input: String,
    scroll: u16,
    follow: bool,
    ui_notice: Option<String>,
}

impl<S: ConversationService + 'static, D: VoiceDevices> InterviewApp<S, D> {
    pub fn new(screen: ConversationScreen<S, D>) -> Self {
        Self {
            screen,
            input: String::new(),
            scroll: 0,
            follow: true,
            ui_notice: None,
        }
    }

    pub fn screen(&self) -> &ConversationScreen<S, D> {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut ConversationScreen<S, D> {
        &mut self.screen
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    fn typing_allowed(&self) -> bool {
        match self.screen.phase() {
            SessionPhase::Selection => !self.screen.turns().is_busy(),
            SessionPhase::Interview => !self.screen.voice().is_voice_mode(),
            SessionPhase::Welcome | SessionPhase::Feedback => false,
        }
    }

    fn submit_input(&mut self) {
        match self.screen.phase() {
            SessionPhase::Welcome => self.screen.begin(),
            SessionPhase::Selection => {
                let Some(request) = self.selection_request() else {
                    return;
                };
                if self.screen.start(request) {
                    self.input.clear();
                    self.ui_notice = None;
                    self.follow = true;
                }
            }
            SessionPhase::Interview => {
                if self.screen.submit_text(&self.input) {
                    self.input.clear();
                    self.follow = true;
                }
            }
            SessionPhase::Feedback => {}
        }
    }

    /// `/case <type>` generates a case, `/upload <path>` loads one, anything else is a topic.
    fn selection_request(&mut self) -> Option<StartRequest> {
        let text = self.input.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(case_type) = text.strip_prefix("/case") {
            let case_type = case_type.trim();
            if case_type.is_empty() {
                self.ui_notice = Some("Usage: /case <case type>".to_string());
                return None;
            }
            return Some(StartRequest::GeneratedCase(case_type.to_string()));
        }
        if let Some(path) = text.strip_prefix("/upload") {
            let path = path.trim();
            if path.is_empty() {
                self.ui_notice = Some("Usage: /upload <path to case text>".to_string());
                return None;
            }
            return match read_case_file(Path::new(path)) {
                Ok(document) => Some(StartRequest::UploadedCase(document)),
                Err(err) => {
                    log_debug(&format!("case upload failed: {err:#}"));
                    self.ui_notice = Some(format!("Could not read case file: {err}"));
                    None
                }
            };
        }
        Some(StartRequest::Topic(text.to_string()))
    }

    fn scroll_up(&mut self, rows: u16) {
        self.follow = false;
        self.scroll = self.scroll.saturating_sub(rows);
    }

    fn scroll_down(&mut self, rows: u16) {
        self.scroll = self.scroll.saturating_add(rows);
    }
}

/// Configure the terminal, run the drawing loop, and tear everything down.
pub fn run_app<S: ConversationService + 'static, D: VoiceDevices>(
    app: &mut InterviewApp<S, D>,
) -> Result<()> {
    let terminal_guard = TerminalRestoreGuard::new();
    terminal_guard.enable_raw_mode()?;
    let mut stdout = io::stdout();
    terminal_guard.enter_alt_screen(&mut stdout)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app_loop(&mut terminal, app);

    app.screen.teardown();
    drop(terminal);
    terminal_guard.restore();

    result
}

fn app_loop<S: ConversationService + 'static, D: VoiceDevices>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut InterviewApp<S, D>,
) -> Result<()> {
    terminal.draw(|frame| draw(frame, app))?;

    loop {
        let before = app.screen.status_text();
        let mut should_draw = app.screen.tick().is_some();
        if app.screen.status_text() != before {
            should_draw = true;
        }

        let poll_duration = if app.screen.turns().is_busy() {
            Duration::from_millis(50)
        } else {
            Duration::from_millis(100)
        };

        let mut should_quit = false;
        if event::poll(poll_duration)? {
            match event::read()? {
                Event::Key(key) => {
                    should_quit = handle_key_event(app, key);
                    should_draw = true;
                }
                Event::Resize(_, _) => should_draw = true,
                _ => {}
            }
        }

        if should_draw {
            terminal.draw(|frame| draw(frame, app))?;
        }
        if should_quit {
            break;
        }
    }
    Ok(())
}

/// Apply one keystroke. Returns true when the app should exit.
fn handle_key_event<S: ConversationService + 'static, D: VoiceDevices>(
    app: &mut InterviewApp<S, D>,
    key: KeyEvent,
) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let in_interview = app.screen.phase() == SessionPhase::Interview;

    match key.code {
        KeyCode::Char('c') if ctrl => return true,
        KeyCode::Esc => return true,
        KeyCode::Char('v') if ctrl && in_interview => {
            app.screen.toggle_voice();
            app.input.clear();
        }
        KeyCode::Char('r') if ctrl && in_interview => app.screen.press_mic(),
        KeyCode::Char('e') if ctrl && in_interview => {
            if app.screen.end_session() {
                app.input.clear();
                app.scroll = 0;
                app.follow = false;
            }
        }
        KeyCode::Char('n') if ctrl => {
            log_debug("starting a new interview");
            app.screen.start_new();
            app.input.clear();
            app.ui_notice = None;
            app.scroll = 0;
            app.follow = true;
        }
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => {
            if app.typing_allowed() {
                app.input.pop();
            }
        }
        KeyCode::Char(ch) if !ctrl => {
            if app.typing_allowed() && !ch.is_control() {
                app.input.push(ch);
            }
        }
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::PageDown => app.scroll_down(10),
        KeyCode::Home => {
            app.follow = false;
            app.scroll = 0;
        }
        KeyCode::End => app.follow = true,
        _ => {}
    }
    if app.screen.notice().is_some() && key.code == KeyCode::Enter {
        app.screen.clear_notice();
    }
    false
}

fn styled_spans(spans: &[TextSpan], base: Style) -> Vec<Span<'static>> {
    spans
        .iter()
        .map(|span| {
            let style = if span.emphasized {
                base.add_modifier(Modifier::BOLD)
            } else {
                base
            };
            Span::styled(sanitize(&span.text), style)
        })
        .collect()
}

/// Strip escape sequences and control characters that would corrupt the terminal.
fn sanitize(text: &str) -> String {
    strip_ansi_escapes::strip_str(text)
        .chars()
        .map(|ch| if ch == '\t' { ' ' } else { ch })
        .filter(|ch| !ch.is_control())
        .collect()
}

fn message_lines(message: &Message, spoken: bool, lines: &mut Vec<Line<'static>>) {
    let body = Style::default().fg(BODY);
    match message.role {
        Role::User => {
            lines.push(Line::from(Span::styled(
                "You",
                Style::default().fg(INPUT).add_modifier(Modifier::BOLD),
            )));
            for text in message.content.lines() {
                lines.push(Line::from(Span::styled(sanitize(text), body)));
            }
        }
        Role::Assistant => {
            let mut header = vec![Span::styled(
                "Interviewer",
                Style::default().fg(TITLE).add_modifier(Modifier::BOLD),
            )];
            if spoken {
                header.push(Span::styled(" (spoken)", Style::default().fg(DIM)));
            }
            lines.push(Line::from(header));
            for block in render(&message.content) {
                match block {
                    DisplayBlock::Paragraph { spans } => {
                        lines.push(Line::from(styled_spans(&spans, body)));
                    }
                    DisplayBlock::ListBlock { items } => {
                        for item in items {
                            let mut row = vec![Span::styled("  • ", Style::default().fg(ACCENT))];
                            row.extend(styled_spans(&item, body));
                            lines.push(Line::from(row));
                        }
                    }
                }
            }
        }
    }
    lines.push(Line::from(""));
}

fn body_lines<S: ConversationService + 'static, D: VoiceDevices>(
    app: &InterviewApp<S, D>,
) -> (&'static str, Vec<Line<'static>>) {
    let turns = app.screen.turns();
    let dim = Style::default().fg(DIM);
    let notice = Style::default().fg(NOTICE);
    let mut lines = Vec::new();

    let title = match app.screen.phase() {
        SessionPhase::Welcome => {
            lines.push(Line::from(Span::styled(
                "Case interview practice",
                Style::default().fg(TITLE).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(
                "Practice consulting case interviews with an AI interviewer, by text or voice.",
            ));
            lines.push(Line::from(Span::styled("Press Enter to begin.", dim)));
            " Welcome "
        }
        SessionPhase::Selection => {
            lines.push(Line::from("Choose how to start:"));
            lines.push(Line::from("  • type a topic, e.g. coffee chain expansion"));
            lines.push(Line::from("  • /case <type> for a generated case, e.g. /case market entry"));
            lines.push(Line::from("  • /upload <path> to interview on your own case text"));
            if turns.is_busy() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Starting interview...", dim)));
            }
            " New Interview "
        }
        SessionPhase::Interview => {
            let spoken = app.screen.voice().is_voice_mode();
            for message in turns.transcript() {
                message_lines(message, spoken && message.role == Role::Assistant, &mut lines);
            }
            if turns.is_busy() {
                lines.push(Line::from(Span::styled("Interviewer is thinking...", dim)));
            }
            " Interview "
        }
        SessionPhase::Feedback => {
            match turns.feedback() {
                None => lines.push(Line::from(Span::styled("Generating feedback...", dim))),
                Some(feedback) => {
                    for (section, text) in feedback.sections() {
                        lines.push(Line::from(Span::styled(
                            section,
                            Style::default().fg(TITLE).add_modifier(Modifier::BOLD),
                        )));
                        for text_line in text.lines() {
                            lines.push(Line::from(sanitize(text_line)));
                        }
                        lines.push(Line::from(""));
                    }
                    lines.push(Line::from(Span::styled("Conversation", dim)));
                    lines.push(Line::from(""));
                    for message in turns.transcript() {
                        message_lines(message, false, &mut lines);
                    }
                }
            }
            " Feedback "
        }
    };

    let notices = [turns.error(), app.screen.notice(), app.ui_notice.as_deref()];
    for text in notices.into_iter().flatten() {
        lines.insert(0, Line::from(Span::styled(text.to_string(), notice)));
    }
    (title, lines)
}

/// Rows one line takes under greedy word wrapping; words wider than the row are split.
fn line_rows(text: &str, width: usize) -> usize {
    let mut rows = 1;
    let mut col = 0;
    for word in text.split(' ') {
        let word_width = UnicodeWidthStr::width(word);
        if col > 0 && col + 1 + word_width <= width {
            col += 1 + word_width;
            continue;
        }
        if col > 0 {
            rows += 1;
        }
        if word_width > width {
            rows += (word_width - 1) / width;
            col = match word_width % width {
                0 => width,
                rest => rest,
            };
        } else {
            col = word_width;
        }
    }
    rows
}

/// Rows the lines occupy once wrapped to `width` columns.
fn wrapped_rows(lines: &[Line<'_>], width: u16) -> usize {
    let width = usize::from(width.max(1));
    lines
        .iter()
        .map(|line| {
            let text: String = line.spans.iter().map(|span| span.content.as_ref()).collect();
            line_rows(&text, width)
        })
        .sum()
}

fn scroll_offset<S: ConversationService + 'static, D: VoiceDevices>(
    app: &InterviewApp<S, D>,
    lines: &[Line<'_>],
    area: Rect,
) -> u16 {
    let inner = area.height.saturating_sub(2);
    let total = wrapped_rows(lines, area.width.saturating_sub(2));
    let max = u16::try_from(total.saturating_sub(usize::from(inner))).unwrap_or(u16::MAX);
    if app.follow {
        max
    } else {
        app.scroll.min(max)
    }
}

fn key_hints(phase: SessionPhase) -> Line<'static> {
    let key = Style::default().fg(INPUT).add_modifier(Modifier::BOLD);
    let label = Style::default().fg(DIM);
    let pairs: &[(&str, &str)] = match phase {
        SessionPhase::Welcome => &[(" Enter ", "begin  "), ("Esc ", "quit ")],
        SessionPhase::Selection => &[(" Enter ", "start  "), ("Esc ", "quit ")],
        SessionPhase::Interview => &[
            (" Enter ", "send  "),
            ("Ctrl+V ", "voice  "),
            ("Ctrl+R ", "mic  "),
            ("Ctrl+E ", "end  "),
            ("Esc ", "quit "),
        ],
        SessionPhase::Feedback => &[(" Ctrl+N ", "new interview  "), ("Esc ", "quit ")],
    };
    Line::from(
        pairs
            .iter()
            .flat_map(|(k, l)| [Span::styled(*k, key), Span::styled(*l, label)])
            .collect::<Vec<_>>(),
    )
}

/// Render the session body, the input box and the status bar.
fn draw<S: ConversationService + 'static, D: VoiceDevices>(
    frame: &mut ratatui::Frame<'_>,
    app: &InterviewApp<S, D>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let (title, lines) = body_lines(app);
    let offset = scroll_offset(app, &lines, chunks[0]);
    let body = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(ACCENT))
                .title(Span::styled(
                    title,
                    Style::default().fg(TITLE).add_modifier(Modifier::BOLD),
                )),
        )
        .style(Style::default().fg(BODY))
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    frame.render_widget(body, chunks[0]);

    let phase = app.screen.phase();
    let voice_prompt = phase == SessionPhase::Interview && app.screen.voice().is_voice_mode();
    let input_text = if voice_prompt {
        app.screen.status_text()
    } else {
        sanitize(&app.input)
    };
    let input = Paragraph::new(input_text.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(ACCENT))
                .title(Span::styled(
                    if voice_prompt { " Voice " } else { " Answer " },
                    Style::default().fg(TITLE).add_modifier(Modifier::BOLD),
                ))
                .title_bottom(key_hints(phase)),
        )
        .style(Style::default().fg(INPUT));
    frame.render_widget(input, chunks[1]);

    let status = if app.screen.turns().is_busy() && !voice_prompt {
        "Thinking...".to_string()
    } else {
        let mode = if app.screen.voice().is_voice_mode() {
            "voice"
        } else {
            "text"
        };
        format!("Mode: {mode}")
    };
    let status_bar = Paragraph::new(status)
        .block(Block::default().borders(Borders::TOP).border_style(Style::default().fg(DIM)))
        .style(Style::default().fg(DIM));
    frame.render_widget(status_bar, chunks[2]);

    if app.typing_allowed() {
        let inner_width = chunks[1].width.saturating_sub(2);
        let input_width =
            UnicodeWidthStr::width(input_text.as_str()).min(u16::MAX as usize) as u16;
        let cursor_x = chunks[1]
            .x
            .saturating_add(1)
            .saturating_add(input_width.min(inner_width));
        frame.set_cursor(cursor_x, chunks[1].y + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoiceSettings;
    use crate::service::FeedbackResult;
    use crate::voice::{DeviceEvent, Utterance, VoiceHandle};
    use anyhow::anyhow;
    use std::thread;
    use std::time::Instant;

    struct OpeningOnly;

    impl ConversationService for OpeningOnly {
        fn start(&self, request: &StartRequest) -> Result<Message> {
            Ok(Message::assistant(format!("Opening for {}", request.label())))
        }

        fn send(&self, _transcript: &[Message], _source: Option<&str>) -> Result<Message> {
            Ok(Message::assistant("- point one\n- point two"))
        }

        fn summarize(&self, _transcript: &[Message]) -> Result<FeedbackResult> {
            Err(anyhow!("offline"))
        }
    }

    struct NoDevices;

    impl VoiceDevices for NoDevices {
        fn capture_supported(&self) -> bool {
            false
        }

        fn start_capture(&mut self, _capture: u64, _lang: &str) -> Result<()> {
            Err(anyhow!("no microphone"))
        }

        fn stop_capture(&mut self) {}

        fn speak(&mut self, _utterance: &Utterance) -> Result<()> {
            Err(anyhow!("no speaker"))
        }

        fn cancel_playback(&mut self) {}

        fn list_voices(&mut self) -> Vec<VoiceHandle> {
            Vec::new()
        }

        fn poll_event(&mut self) -> Option<DeviceEvent> {
            None
        }
    }

    fn test_app() -> InterviewApp<OpeningOnly, NoDevices> {
        InterviewApp::new(ConversationScreen::new(
            OpeningOnly,
            NoDevices,
            VoiceSettings::default(),
        ))
    }

    fn press(app: &mut InterviewApp<OpeningOnly, NoDevices>, code: KeyCode) -> bool {
        handle_key_event(app, KeyEvent::new(code, KeyModifiers::empty()))
    }

    fn ctrl(app: &mut InterviewApp<OpeningOnly, NoDevices>, ch: char) -> bool {
        handle_key_event(app, KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL))
    }

    fn type_text(app: &mut InterviewApp<OpeningOnly, NoDevices>, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn wait_idle(app: &mut InterviewApp<OpeningOnly, NoDevices>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.screen_mut().tick().is_none() {
            assert!(Instant::now() < deadline, "service never answered");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn welcome_ignores_typing_until_enter() {
        let mut app = test_app();
        type_text(&mut app, "hi");
        assert_eq!(app.input(), "");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.screen().phase(), SessionPhase::Selection);
    }

    #[test]
    fn selection_starts_generated_case_and_interview_accepts_text() {
        let mut app = test_app();
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "/case market entry");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.input(), "");
        wait_idle(&mut app);
        assert_eq!(app.screen().phase(), SessionPhase::Interview);
        assert_eq!(
            app.screen().turns().transcript()[0].content,
            "Opening for generated_case"
        );

        type_text(&mut app, "ab");
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.input(), "a");
        press(&mut app, KeyCode::Enter);
        wait_idle(&mut app);
        assert_eq!(app.screen().turns().transcript().len(), 3);
    }

    #[test]
    fn bare_case_command_shows_usage() {
        let mut app = test_app();
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "/case");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.screen().phase(), SessionPhase::Selection);
        assert!(app.ui_notice.is_some());
        assert!(!app.screen().turns().is_busy());
    }

    #[test]
    fn voice_toggle_without_capture_shows_notice() {
        let mut app = test_app();
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "pricing");
        press(&mut app, KeyCode::Enter);
        wait_idle(&mut app);
        ctrl(&mut app, 'v');
        assert!(!app.screen().voice().is_voice_mode());
        assert!(app.screen().notice().is_some());
    }

    #[test]
    fn ctrl_e_then_ctrl_n_returns_to_welcome() {
        let mut app = test_app();
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "pricing");
        press(&mut app, KeyCode::Enter);
        wait_idle(&mut app);
        ctrl(&mut app, 'e');
        assert_eq!(app.screen().phase(), SessionPhase::Feedback);
        wait_idle(&mut app);
        ctrl(&mut app, 'n');
        assert_eq!(app.screen().phase(), SessionPhase::Welcome);
    }

    #[test]
    fn escape_and_ctrl_c_quit() {
        let mut app = test_app();
        assert!(press(&mut app, KeyCode::Esc));
        assert!(ctrl(&mut app, 'c'));
        assert!(!press(&mut app, KeyCode::Down));
    }

    #[test]
    fn sanitize_drops_escape_sequences() {
        assert_eq!(sanitize("\u{1b}[31mred\u{1b}[0m ok"), "red ok");
    }

    #[test]
    fn wrapped_rows_follow_word_boundaries() {
        let lines = vec![Line::from("aaa bbb ccc ddd")];
        assert_eq!(wrapped_rows(&lines, 6), 4);
        let lines = vec![Line::from(vec![Span::raw("You said: "), Span::raw("fine")])];
        assert_eq!(wrapped_rows(&lines, 40), 1);
    }

    #[test]
    fn wrapped_rows_counts_long_lines() {
        let lines = vec![Line::from("abcdefghij"), Line::from("")];
        assert_eq!(wrapped_rows(&lines, 4), 4);
    }
}
