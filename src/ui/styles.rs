use ratatui::style;

pub struct ProgressStyles {
    pub bar: style::Style,
    pub bar_done: style::Style,
    pub eta: style::Style,
    pub status: style::Style,
    pub error: style::Style,
}

impl Default for ProgressStyles {
    fn default() -> Self {
        Self {
            bar: style::Style::default().fg(style::Color::Cyan),
            bar_done: style::Style::default()
                .fg(style::Color::Green)
                .add_modifier(style::Modifier::BOLD),
            eta: style::Style::default().add_modifier(style::Modifier::BOLD),
            status: style::Style::default()
                .add_modifier(style::Modifier::ITALIC | style::Modifier::DIM),
            error: style::Style::default().fg(style::Color::Red),
        }
    }
}
