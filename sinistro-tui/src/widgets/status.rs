//! One-line status summary.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub struct StatusLine {
    pub title: String,
    pub segments: Vec<(String, Style)>,
}

impl StatusLine {
    pub fn render(&self, f: &mut Frame<'_>, area: Rect) {
        let mut spans = Vec::with_capacity(self.segments.len() * 2);
        for (i, (text, style)) in self.segments.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" | "));
            }
            spans.push(Span::styled(text.as_str(), *style));
        }
        let paragraph = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .title(self.title.as_str())
                .borders(Borders::ALL),
        );
        f.render_widget(paragraph, area);
    }
}
