//! Select field and its option list.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

use crate::selection::ControlView;
use crate::theme::{value_color, Theme};

/// The closed control: label and reconciled value.
pub struct SelectField<'a> {
    pub label: Line<'a>,
    pub view: &'a ControlView<'a>,
    pub focused: bool,
    pub theme: &'a Theme,
}

impl<'a> SelectField<'a> {
    pub fn render(&self, f: &mut Frame<'_>, area: Rect) {
        let border = if self.focused {
            self.theme.border_focus
        } else {
            self.theme.border
        };
        let mut spans = vec![Span::styled(
            self.view.value.label(),
            Style::default().fg(value_color(&self.view.value, self.theme)),
        )];
        if let Some(error) = self.view.error {
            spans.push(Span::styled(
                format!("  ! {error}"),
                Style::default().fg(self.theme.error),
            ));
        }

        let paragraph = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .title(self.label.clone())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        );
        f.render_widget(paragraph, area);
    }
}

/// The open option list, drawn over whatever lies below the field.
pub struct OptionList<'a> {
    pub view: &'a ControlView<'a>,
    pub theme: &'a Theme,
}

impl<'a> OptionList<'a> {
    pub fn render(&self, f: &mut Frame<'_>, area: Rect) {
        let rows = area.height.saturating_sub(2) as usize;
        let items: Vec<ListItem> = self
            .view
            .options
            .iter()
            .enumerate()
            .skip(self.view.offset)
            .take(rows)
            .map(|(index, item)| {
                let style = if index == self.view.cursor {
                    Style::default()
                        .fg(self.theme.primary)
                        .bg(self.theme.bg_highlight)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(self.theme.text)
                };
                ListItem::new(Span::styled(item.display_name.as_str(), style))
            })
            .collect();

        let title = format!(
            "/{}  {} of {} shown",
            self.view.search,
            self.view.options.len(),
            self.view.matches
        );
        let list = List::new(items).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.border_focus)),
        );
        f.render_widget(Clear, area);
        f.render_widget(list, area);
    }
}
