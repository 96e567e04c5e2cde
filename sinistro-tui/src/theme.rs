//! Console palette and color utilities.

use ratatui::style::Color;
use sinistro_storage::CollectionState;

use crate::notifications::NotificationLevel;
use crate::selection::RenderableValue;

#[derive(Debug, Clone)]
pub struct Theme {
    pub bg: Color,
    pub bg_highlight: Color,
    pub primary: Color,
    pub primary_dim: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub text: Color,
    pub text_dim: Color,
    pub text_muted: Color,
    pub border: Color,
    pub border_focus: Color,
}

impl Theme {
    pub fn console() -> Self {
        Self {
            bg: Color::Rgb(16, 18, 24),
            bg_highlight: Color::Rgb(40, 44, 56),
            primary: Color::Rgb(86, 182, 194),
            primary_dim: Color::Rgb(48, 102, 110),
            success: Color::Rgb(152, 195, 121),
            warning: Color::Rgb(229, 192, 123),
            error: Color::Rgb(224, 108, 117),
            info: Color::Rgb(97, 175, 239),
            text: Color::Rgb(220, 223, 228),
            text_dim: Color::Rgb(140, 146, 158),
            text_muted: Color::Rgb(84, 90, 102),
            border: Color::Rgb(84, 90, 102),
            border_focus: Color::Rgb(86, 182, 194),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::console()
    }
}

pub fn collection_color(state: &CollectionState, theme: &Theme) -> Color {
    if state.loading {
        theme.warning
    } else if state.error.is_some() {
        theme.error
    } else if state.is_empty() {
        theme.text_muted
    } else {
        theme.success
    }
}

pub fn value_color(value: &RenderableValue<'_>, theme: &Theme) -> Color {
    match value {
        RenderableValue::Loading => theme.warning,
        RenderableValue::NoOptions => theme.text_muted,
        RenderableValue::Unselected => theme.text_dim,
        RenderableValue::Selected(_) => theme.text,
    }
}

pub fn notification_color(level: &NotificationLevel, theme: &Theme) -> Color {
    match level {
        NotificationLevel::Info => theme.info,
        NotificationLevel::Warning => theme.warning,
        NotificationLevel::Error => theme.error,
    }
}
