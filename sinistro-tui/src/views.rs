//! Screen layout.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use sinistro_storage::CollectionState;

use crate::selection::ControlView;
use crate::state::{App, DROPDOWN_ROWS};
use crate::theme::{collection_color, notification_color};
use crate::widgets::{OptionList, SelectField, StatusLine};

const FIELD_HEIGHT: u16 = 3;

pub fn render_view(f: &mut Frame<'_>, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.size());

    let states: Vec<CollectionState> = (0..app.fields.len())
        .map(|index| app.field_state(index))
        .collect();

    render_header(f, app, &states, layout[0]);
    render_form(f, app, &states, layout[1]);
    render_footer(f, app, layout[2]);

    if app.show_help {
        render_help(f, app, layout[1]);
    }
}

fn render_header(f: &mut Frame<'_>, app: &App, states: &[CollectionState], area: Rect) {
    let theme = &app.theme;
    let status = app.store.status();
    let stats = app.store.cache().stats();

    let mut segments = vec![(
        if status.loading { "loading…" } else { "idle" }.to_string(),
        Style::default().fg(if status.loading { theme.warning } else { theme.text_dim }),
    )];
    let loaded = states.iter().filter(|state| !state.is_empty()).count();
    segments.push((
        format!("{loaded}/{} fields ready", states.len()),
        Style::default().fg(theme.text),
    ));
    segments.push((
        if app.store.cache().is_degraded() {
            "cache unavailable".to_string()
        } else {
            format!("cache hit rate {:.0}%", stats.hit_rate() * 100.0)
        },
        Style::default().fg(theme.info),
    ));
    if !status.errors.is_empty() {
        segments.push((
            format!("{} failed", status.errors.len()),
            Style::default().fg(theme.error),
        ));
    }

    StatusLine {
        title: "SINISTRO | Reference data".to_string(),
        segments,
    }
    .render(f, area);
}

fn render_form(f: &mut Frame<'_>, app: &App, states: &[CollectionState], area: Rect) {
    let mut constraints: Vec<Constraint> = app
        .fields
        .iter()
        .map(|_| Constraint::Length(FIELD_HEIGHT))
        .collect();
    constraints.push(Constraint::Min(0));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let views: Vec<ControlView<'_>> = app
        .fields
        .iter()
        .zip(states)
        .map(|(field, state)| field.control.view(state, &field.value))
        .collect();

    for (index, (field, view)) in app.fields.iter().zip(&views).enumerate() {
        let color = collection_color(&states[index], &app.theme);
        let label = format!("{} ({})", field.control.label(), field.control.key());
        let title = Line::styled(label, Style::default().fg(color));
        SelectField {
            label: title,
            view,
            focused: index == app.focus,
            theme: &app.theme,
        }
        .render(f, rows[index]);
    }

    // The open list goes last so it draws over the fields below it.
    if let Some(view) = views.get(app.focus).filter(|view| view.open) {
        let field_area = rows[app.focus];
        let top = field_area.y + field_area.height;
        let height = (DROPDOWN_ROWS as u16 + 2).min((area.y + area.height).saturating_sub(top));
        let list_area = Rect::new(field_area.x, top, field_area.width, height);
        OptionList {
            view,
            theme: &app.theme,
        }
        .render(f, list_area);
    }
}

fn render_footer(f: &mut Frame<'_>, app: &App, area: Rect) {
    let help = "Tab/j/k move • Enter open • x clear • r reload • R force • i invalidate • I invalidate all • ? help • q quit";
    let (text, style) = match app.notifications.last() {
        Some(note) => (
            format!("{}: {}", note.label(), note.message),
            Style::default().fg(notification_color(&note.level, &app.theme)),
        ),
        None => (help.to_string(), Style::default().fg(app.theme.text_dim)),
    };
    let footer = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .style(style);
    f.render_widget(footer, area);
}

fn render_help(f: &mut Frame<'_>, app: &App, area: Rect) {
    let lines = vec![
        Line::raw("Tab / j / ↓      next field"),
        Line::raw("Shift-Tab / k / ↑ previous field"),
        Line::raw("Enter / Space    open options (type to search)"),
        Line::raw("x / Del          clear the field"),
        Line::raw("r                load (uses cache)"),
        Line::raw("R / Ctrl-r       reload from the server"),
        Line::raw("i                invalidate this collection"),
        Line::raw("I                invalidate everything"),
        Line::raw("q                quit"),
    ];
    let width = area.width.min(52);
    let height = area.height.min(lines.len() as u16 + 2);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title("Keybindings")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(app.theme.border_focus)),
    );
    f.render_widget(Clear, popup);
    f.render_widget(paragraph, popup);
}
