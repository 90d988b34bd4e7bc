use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{block::Title, Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use tui_dispatch::{DataResource, EventKind, EventOutcome};
use tui_dispatch_components::centered_rect;

use crate::action::Action;
use crate::model::{Battle, EffectPayload, Participant, Team, TurnResult};
use crate::selection::TargetChoice;
use crate::state::{AppState, BattleOutcome, Phase};

const BG_BASE: Color = Color::Rgb(18, 20, 28);
const BG_PANEL: Color = Color::Rgb(30, 34, 46);
const BG_PANEL_ALT: Color = Color::Rgb(26, 28, 38);
const TEXT_MAIN: Color = Color::Rgb(230, 232, 240);
const TEXT_DIM: Color = Color::Rgb(150, 156, 176);
const ACCENT: Color = Color::Rgb(120, 184, 232);
const ACCENT_GREEN: Color = Color::Rgb(104, 204, 120);
const ACCENT_GOLD: Color = Color::Rgb(222, 196, 120);
const ACCENT_RED: Color = Color::Rgb(220, 96, 96);
const HIGHLIGHT_TEXT: Color = Color::Rgb(16, 18, 26);
const BORDER_ACCENT: Color = Color::Rgb(76, 84, 110);

const LOG_PANEL_WIDTH: u16 = 36;
const COUNTDOWN_WARN_SECS: u32 = 5;

pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    frame.render_widget(Block::default().style(Style::default().bg(BG_BASE)), area);

    let battle = match &state.battle {
        DataResource::Loaded(battle) => battle,
        DataResource::Empty | DataResource::Loading => {
            render_notice(frame, area, "Loading battle...", TEXT_DIM);
            return;
        }
        DataResource::Failed(error) => {
            let message = format!("Could not load battle: {error}\n\nR: Retry  |  Q: Quit");
            render_notice(frame, area, &message, ACCENT_RED);
            return;
        }
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(8),    // Teams + log
            Constraint::Length(8), // Command box
        ])
        .split(area);

    render_header(frame, rows[0], state, battle);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(LOG_PANEL_WIDTH)])
        .split(rows[1]);
    let teams = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(body[0]);
    render_team(frame, teams[0], state, battle, Team::Enemy);
    render_team(frame, teams[1], state, battle, Team::Player);
    render_log(frame, body[1], state);

    render_command(frame, rows[2], state);

    if state.phase == Phase::Results {
        if let Some(outcome) = &state.outcome {
            render_results(frame, area, outcome, state.dismissed);
        }
    }
    if let Some(error) = &state.error {
        render_error(frame, area, error);
    }
}

pub fn handle_event(event: &EventKind, state: &AppState) -> EventOutcome<Action> {
    match event {
        EventKind::Resize(width, height) => {
            EventOutcome::action(Action::UiTerminalResize(*width, *height)).with_render()
        }
        EventKind::Key(key) => handle_key(*key, state),
        _ => EventOutcome::ignored(),
    }
}

fn handle_key(key: KeyEvent, state: &AppState) -> EventOutcome<Action> {
    if key.kind == KeyEventKind::Release {
        return EventOutcome::ignored();
    }
    if matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q')) {
        return EventOutcome::action(Action::Quit);
    }
    if state.error.is_some() && key.code == KeyCode::Esc {
        return EventOutcome::action(Action::ErrorDismiss);
    }
    if state.battle.is_failed() {
        return match key.code {
            KeyCode::Char('r') | KeyCode::Char('R') => EventOutcome::action(Action::Init),
            _ => EventOutcome::ignored(),
        };
    }

    let confirm = matches!(
        key.code,
        KeyCode::Enter | KeyCode::Char('z') | KeyCode::Char('Z')
    );
    match state.phase {
        Phase::Selection => handle_selection_key(key, state),
        Phase::Submitting => EventOutcome::ignored(),
        Phase::Result if confirm => EventOutcome::action(Action::ResultAdvance),
        Phase::Results if confirm && !state.dismissed => {
            EventOutcome::action(Action::ResultsDismiss)
        }
        Phase::Result | Phase::Results => EventOutcome::ignored(),
    }
}

fn handle_selection_key(key: KeyEvent, state: &AppState) -> EventOutcome<Action> {
    let action = match key.code {
        KeyCode::Enter | KeyCode::Char('z') | KeyCode::Char('Z') => Some(Action::TurnConfirm),
        KeyCode::Up | KeyCode::Char('w') => cycle_ability(state, -1),
        KeyCode::Down | KeyCode::Char('s') => cycle_ability(state, 1),
        KeyCode::Left | KeyCode::Char('a') => cycle_target(state, -1),
        KeyCode::Right | KeyCode::Char('d') => cycle_target(state, 1),
        KeyCode::Tab => cycle_actor(state),
        _ => None,
    };
    EventOutcome::from(action)
}

fn cycle_ability(state: &AppState, step: isize) -> Option<Action> {
    let abilities = state.equipped_abilities();
    let current = state
        .selection
        .ability_id
        .as_deref()
        .and_then(|id| abilities.iter().position(|ability| ability.id == id));
    let next = cycle_index(current, abilities.len(), step)?;
    Some(Action::AbilitySelect(abilities[next].id.clone()))
}

fn cycle_target(state: &AppState, step: isize) -> Option<Action> {
    if state.selection.target == Some(TargetChoice::All) {
        return None;
    }
    let actor = state.actor()?;
    let battle = state.current_battle()?;
    let targets: Vec<&Participant> = battle.living(actor.team.opponent()).collect();
    let current = state
        .selection
        .target_id()
        .and_then(|id| targets.iter().position(|p| p.id == id));
    let next = cycle_index(current, targets.len(), step)?;
    Some(Action::TargetSelect(targets[next].id.clone()))
}

fn cycle_actor(state: &AppState) -> Option<Action> {
    let battle = state.current_battle()?;
    let players: Vec<&Participant> = battle.living(Team::Player).collect();
    let current = state
        .actor()
        .and_then(|actor| players.iter().position(|p| p.id == actor.id));
    let next = cycle_index(current, players.len(), 1)?;
    let id = &players[next].id;
    (state.actor().map(|actor| &actor.id) != Some(id)).then(|| Action::ActorSelect(id.clone()))
}

/// Wrapping step through `len` entries. With nothing selected, forward
/// steps land on the first entry and backward steps on the last.
fn cycle_index(current: Option<usize>, len: usize, step: isize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let next = match current {
        Some(idx) => (idx as isize + step).rem_euclid(len as isize) as usize,
        None if step < 0 => len - 1,
        None => 0,
    };
    Some(next)
}

fn render_notice(frame: &mut Frame, area: Rect, message: &str, color: Color) {
    let block = panel_block(" BATTLE ", BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let paragraph = Paragraph::new(message.to_string())
        .style(Style::default().fg(color))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn render_header(frame: &mut Frame, area: Rect, state: &AppState, battle: &Battle) {
    let block = panel_block(" BATTLE ", BG_PANEL_ALT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut spans = vec![
        Span::styled(
            format!("Turn {}", battle.turn.max(1)),
            Style::default().fg(TEXT_MAIN).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(phase_label(state.phase), Style::default().fg(ACCENT)),
    ];
    if state.countdown.is_armed() {
        let remaining = state.countdown.remaining();
        let color = if remaining <= COUNTDOWN_WARN_SECS {
            ACCENT_RED
        } else {
            ACCENT_GOLD
        };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{remaining}s"),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Selection => "Choose your action",
        Phase::Submitting => "Resolving turn...",
        Phase::Result => "Turn result",
        Phase::Results => "Battle over",
    }
}

fn render_team(frame: &mut Frame, area: Rect, state: &AppState, battle: &Battle, team: Team) {
    let title = format!(" {} ", team.label().to_ascii_uppercase());
    let block = panel_block(title.as_str(), BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let actor_id = state.actor().map(|actor| actor.id.as_str());
    let area_target = state.selection.target == Some(TargetChoice::All);
    let mut lines = Vec::new();
    for participant in battle.team(team) {
        let is_actor = actor_id == Some(participant.id.as_str());
        let is_target = participant.is_alive()
            && (state.selection.target_id() == Some(participant.id.as_str())
                || (area_target && team == Team::Enemy));
        lines.push(participant_line(participant, is_actor, is_target));
        if let Some(effects) = effects_line(participant) {
            lines.push(effects);
        }
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No one here.",
            Style::default().fg(TEXT_DIM),
        )));
    }

    let paragraph = Paragraph::new(Text::from(lines)).style(Style::default().fg(TEXT_MAIN));
    frame.render_widget(paragraph, inner);
}

fn participant_line(participant: &Participant, is_actor: bool, is_target: bool) -> Line<'static> {
    let marker = if is_actor {
        "> "
    } else if is_target {
        "* "
    } else {
        "  "
    };
    let name_style = if participant.is_defeated() {
        Style::default()
            .fg(TEXT_DIM)
            .add_modifier(Modifier::CROSSED_OUT)
    } else if is_target {
        Style::default().fg(ACCENT_RED).add_modifier(Modifier::BOLD)
    } else if is_actor {
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(TEXT_MAIN)
    };

    let mut spans = vec![
        Span::styled(marker, Style::default().fg(ACCENT_GOLD)),
        Span::styled(format!("{:<14}", participant.name), name_style),
    ];
    spans.extend(hp_line(participant).spans);
    Line::from(spans)
}

fn effects_line(participant: &Participant) -> Option<Line<'static>> {
    let mut spans = Vec::new();
    let groups: [(&[EffectPayload], Color); 3] = [
        (&participant.status_effects, ACCENT_GOLD),
        (&participant.buffs, ACCENT_GREEN),
        (&participant.debuffs, ACCENT_RED),
    ];
    for (effects, color) in groups {
        for effect in effects {
            let label = if effect.duration_ticks > 0 {
                format!("{}({}) ", effect.name, effect.duration_ticks)
            } else {
                format!("{} ", effect.name)
            };
            spans.push(Span::styled(label, Style::default().fg(color)));
        }
    }
    if spans.is_empty() {
        return None;
    }
    spans.insert(0, Span::raw("    "));
    Some(Line::from(spans))
}

fn hp_line(participant: &Participant) -> Line<'static> {
    let width: usize = 12;
    let ratio = participant.health_ratio();
    let filled = ((ratio * width as f32).round() as usize).min(width);
    let empty = width.saturating_sub(filled);
    let color = if ratio > 0.5 {
        ACCENT_GREEN
    } else if ratio > 0.2 {
        ACCENT_GOLD
    } else {
        ACCENT_RED
    };
    Line::from(vec![
        Span::raw("HP "),
        Span::styled(
            "█".repeat(filled),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled("░".repeat(empty), Style::default().fg(TEXT_DIM)),
        Span::raw(format!(
            " {}/{}",
            participant.current_health.max(0),
            participant.max_health
        )),
    ])
}

fn render_log(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" LOG ", BG_PANEL_ALT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let visible = inner.height as usize;
    let start = state.log.len().saturating_sub(visible);
    let lines: Vec<Line> = state.log[start..]
        .iter()
        .map(|line| {
            let style = if line.starts_with("Turn ") {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(TEXT_DIM)
            };
            Line::from(Span::styled(line.clone(), style))
        })
        .collect();
    frame.render_widget(Paragraph::new(Text::from(lines)), inner);
}

fn render_command(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" COMMAND ", BG_PANEL_ALT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = match state.phase {
        Phase::Selection => selection_lines(state),
        Phase::Submitting => vec![Line::from(Span::styled(
            "Waiting for the battle server...",
            Style::default().fg(TEXT_DIM),
        ))],
        Phase::Result => state
            .turn_result
            .as_ref()
            .map(result_lines)
            .unwrap_or_default(),
        Phase::Results => vec![Line::from(Span::styled(
            "The battle is over.",
            Style::default().fg(TEXT_DIM),
        ))],
    };

    let paragraph = Paragraph::new(Text::from(lines))
        .style(Style::default().fg(TEXT_MAIN))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn selection_lines(state: &AppState) -> Vec<Line<'static>> {
    let Some(actor) = state.actor() else {
        return vec![Line::from(Span::styled(
            "No one on your team can act.",
            Style::default().fg(ACCENT_RED),
        ))];
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(actor.name.clone(), Style::default().fg(ACCENT)),
        Span::raw(" will use:"),
    ])];

    let abilities = state.equipped_abilities();
    if abilities.is_empty() {
        lines.push(Line::from(Span::styled(
            "No abilities equipped.",
            Style::default().fg(ACCENT_RED),
        )));
    } else {
        let mut spans = Vec::new();
        for ability in abilities {
            let selected = state.selection.ability_id.as_deref() == Some(ability.id.as_str());
            let label = if ability.is_area() {
                format!(" {} (all) ", ability.name)
            } else {
                format!(" {} ", ability.name)
            };
            spans.push(Span::styled(label, menu_style(selected)));
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }

    if let Some(description) = state
        .selected_ability()
        .and_then(|ability| ability.description.clone())
    {
        lines.push(Line::from(Span::styled(
            description,
            Style::default().fg(TEXT_DIM),
        )));
    }

    let target = match &state.selection.target {
        Some(TargetChoice::All) => "all enemies".to_string(),
        Some(TargetChoice::Participant(id)) => state
            .current_battle()
            .and_then(|battle| battle.participant(id))
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.clone()),
        None => "-".to_string(),
    };
    lines.push(Line::from(vec![
        Span::styled("Target: ", Style::default().fg(TEXT_DIM)),
        Span::styled(target, Style::default().fg(ACCENT_RED)),
    ]));
    lines.push(Line::from(Span::styled(
        "↑↓: Ability  ←→: Target  Tab: Actor  Z/Enter: Confirm  Q: Quit",
        Style::default().fg(TEXT_DIM),
    )));
    lines
}

fn result_lines(result: &TurnResult) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = result
        .messages()
        .map(|message| Line::from(message.clone()))
        .collect();
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "Nothing happened.",
            Style::default().fg(TEXT_DIM),
        )));
    }
    let hint = if result.finished {
        "Tallying the results..."
    } else {
        "Z/Enter: Continue"
    };
    lines.push(Line::from(Span::styled(hint, Style::default().fg(TEXT_DIM))));
    lines
}

fn render_results(frame: &mut Frame, area: Rect, outcome: &BattleOutcome, dismissed: bool) {
    let modal_area = centered_rect(40, 11, area);
    frame.render_widget(Clear, modal_area);

    let (title, color) = if outcome.victory {
        (" VICTORY ", ACCENT_GREEN)
    } else {
        (" DEFEAT ", ACCENT_RED)
    };
    let block = panel_block(title, BG_PANEL).border_style(Style::default().fg(color));
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    let rewards = &outcome.rewards;
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("Experience: {}", rewards.experience),
            Style::default().fg(TEXT_MAIN),
        )),
    ];
    if rewards.level_up {
        lines.push(Line::from(Span::styled(
            "Level up!",
            Style::default().fg(ACCENT_GOLD).add_modifier(Modifier::BOLD),
        )));
    }
    if rewards.currency > 0 {
        lines.push(Line::from(format!("Gold: {}", rewards.currency)));
    }
    if !rewards.items.is_empty() {
        lines.push(Line::from(format!("Items: {}", rewards.items.join(", "))));
    }
    if !rewards.unlocked_abilities.is_empty() {
        lines.push(Line::from(format!(
            "Unlocked: {}",
            rewards.unlocked_abilities.join(", ")
        )));
    }
    lines.push(Line::from(""));
    let hint = if dismissed {
        "Leaving battle..."
    } else {
        "Z/Enter: Leave battle"
    };
    lines.push(Line::from(Span::styled(hint, Style::default().fg(TEXT_DIM))));

    let paragraph = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn render_error(frame: &mut Frame, area: Rect, message: &str) {
    let modal_area = centered_rect(48, 6, area);
    frame.render_widget(Clear, modal_area);

    let block = panel_block(" ERROR ", BG_PANEL).border_style(Style::default().fg(ACCENT_RED));
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    let lines = vec![
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(TEXT_MAIN),
        )),
        Line::from(Span::styled("Esc: Dismiss", Style::default().fg(TEXT_DIM))),
    ];
    let paragraph = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn menu_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(HIGHLIGHT_TEXT)
            .bg(ACCENT_GREEN)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(TEXT_MAIN)
    }
}

fn panel_block<'a, T>(title: T, bg: Color) -> Block<'a>
where
    T: Into<Title<'a>>,
{
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title)
        .style(Style::default().bg(bg).fg(TEXT_MAIN))
        .border_style(Style::default().fg(BORDER_ACCENT))
}
