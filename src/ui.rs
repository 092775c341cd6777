use crate::{
    dice::Face,
    notice::NoticeLevel,
    session::{
        DiePanel,
        Panel,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::{
    Stdout,
    stdout,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Roll,
    Redraw,
}

pub type InputEventReceiver = EventStream;

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    ended: bool,
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    QuitModal,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // One persistent Terminal so buffers survive across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, panel: &Panel) -> Result<()> {
    state.ended = panel.ended.is_some();
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, panel))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

/// Maps a terminal event to what the player asked for, updating modal state
/// on the way.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) => key,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(UserEvent::Quit);
    }
    if state.ended {
        return Some(UserEvent::Quit);
    }
    match state.mode {
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('r') | KeyCode::Enter => Some(UserEvent::Roll),
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, state: &UiState, panel: &Panel) {
    f.render_widget(Clear, f.area());
    if let Some(reason) = &panel.ended {
        draw_ended(f, reason);
        return;
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // scores + turn
            Constraint::Length(10), // dice
            Constraint::Min(3),     // notices
            Constraint::Length(3),  // controls
        ])
        .split(f.area());

    draw_header(f, chunks[0], panel);
    draw_dice(f, chunks[1], panel);
    draw_notices(f, chunks[2], panel);
    draw_controls(f, chunks[3], panel);
    draw_modals(f, state);
}

fn draw_header(f: &mut Frame, area: Rect, panel: &Panel) {
    let reward = match panel.reward {
        Some(reward) => format!("{reward}$"),
        None => "-".to_string(),
    };
    let turn = if panel.view.active_turn {
        Span::styled(
            "Your turn",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled("Opponent's turn", Style::default().fg(Color::Yellow))
    };
    let line = Line::from(vec![
        Span::raw(format!("Opponent: {} | ", panel.view.opponent_result)),
        Span::raw(format!("You: {} | ", panel.view.own_result)),
        Span::raw(format!("Reward: {reward} | ")),
        turn,
    ]);
    let widget =
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Room"));
    f.render_widget(widget, area);
}

fn draw_dice(f: &mut Frame, area: Rect, panel: &Panel) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    draw_die(f, columns[0], "Opponent", &panel.opponent_die);
    draw_die(f, columns[1], "You", &panel.own_die);
}

fn draw_die(f: &mut Frame, area: Rect, title: &str, die: &DiePanel) {
    let border = if die.rolling {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let mut lines = vec![Line::from("┌───────┐")];
    for row in pip_rows(die.face_up) {
        lines.push(Line::from(format!("│{row}│")));
    }
    lines.push(Line::from("└───────┘"));
    lines.push(Line::from(Span::styled(
        die.orientation.to_string(),
        Style::default().fg(Color::DarkGray),
    )));
    let widget = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title),
    );
    f.render_widget(widget, area);
}

fn pip_rows(face: Face) -> [&'static str; 3] {
    match face.value() {
        1 => ["       ", "   ●   ", "       "],
        2 => ["●      ", "       ", "      ●"],
        3 => ["●      ", "   ●   ", "      ●"],
        4 => ["●     ●", "       ", "●     ●"],
        5 => ["●     ●", "   ●   ", "●     ●"],
        _ => ["●     ●", "●     ●", "●     ●"],
    }
}

fn draw_notices(f: &mut Frame, area: Rect, panel: &Panel) {
    let lines: Vec<Line> = panel
        .notices
        .iter()
        .map(|notice| {
            let color = match notice.level {
                NoticeLevel::Info => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            Line::from(Span::styled(notice.text.clone(), Style::default().fg(color)))
        })
        .collect();
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Notices"));
    f.render_widget(widget, area);
}

fn draw_controls(f: &mut Frame, area: Rect, panel: &Panel) {
    let line = Line::from(vec![
        roll_control(panel.roll_enabled),
        Span::raw(" | q/Esc quit"),
    ]);
    let widget =
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(widget, area);
}

fn roll_control(enabled: bool) -> Span<'static> {
    if enabled {
        Span::styled(
            "r/Enter roll",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled("r/Enter roll", Style::default().fg(Color::DarkGray))
    }
}

fn draw_ended(f: &mut Frame, reason: &str) {
    let area = centered_rect(60, 30, f.area());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title("Left the room");
    let p = Paragraph::new(vec![
        Line::from(reason.to_string()),
        Line::from(""),
        Line::from("Press any key to exit"),
    ])
    .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(p, block.inner(area));
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match state.mode {
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Leave the room? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
