use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        key_line("Enter", 7, "Ask the typed question"),
        key_line("Tab", 9, "Switch tabs"),
        key_line("Ctrl-D", 6, "Show/hide AI engine details"),
        key_line("Ctrl-Y", 6, "Copy generated SQL"),
        key_line("F1", 10, "Show this help"),
        key_line("Esc", 9, "Quit (also Ctrl-C)"),
        Line::from(""),
        Line::from("History tab:"),
        key_line("↑/↓", 9, "Navigate"),
        key_line("Enter", 7, "Show the selected answer again"),
        key_line("Ctrl-E", 6, "Export selected as JSON"),
        Line::from(""),
        Line::from("Only the last 5 answers are kept, for this session only."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
