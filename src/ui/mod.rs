use std::collections::HashSet;

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use time::{macros::format_description, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{
    AppState, CardCover, CreateDialog, DialogField, NotebookCard, OverlayState, Picker, Route,
    ToastKind, EXPORT_FORMATS,
};
use crate::config::palette::{FontRegistry, PageColorPalette, PenPalette};
use crate::editor::{PageBuffer, PageEditor};
use crate::journaling::AutoSaveStatus;
use crate::notebook::CoverType;
use crate::richtext::RichText;

const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

pub fn draw_app(
    frame: &mut Frame,
    state: &AppState,
    editor: Option<&PageEditor>,
    list_state: &mut ListState,
) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(2)])
        .split(frame.size());

    match (&state.route, editor) {
        (Route::Editor, Some(editor)) => draw_editor(frame, vertical[0], editor),
        (Route::Loading { .. }, _) => draw_loading(frame, vertical[0]),
        _ => draw_list(frame, vertical[0], state, list_state),
    }

    let status = build_status_line(state, editor);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[1]);

    render_overlay(frame, state);
    render_toasts(frame, state);
}

fn draw_list(frame: &mut Frame, area: Rect, state: &AppState, list_state: &mut ListState) {
    let mut items: Vec<ListItem> = state.list.cards.iter().map(card_item).collect();
    if items.is_empty() {
        items.push(ListItem::new(Text::from(vec![
            Line::from(""),
            Line::from(Span::styled(
                "No notebooks yet.",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Press n to create your first notebook.",
                Style::default().fg(Color::Gray),
            )),
        ])));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .title("My Notebooks")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");
    frame.render_stateful_widget(list, area, list_state);
}

fn card_item(card: &NotebookCard) -> ListItem<'static> {
    let cover_span = match &card.cover {
        CardCover::Color(color) => Span::styled(
            "██ ",
            Style::default().fg(parse_hex_color(color).unwrap_or(Color::Gray)),
        ),
        CardCover::Image { .. } => Span::styled("[img] ", Style::default().fg(Color::Magenta)),
        CardCover::Link(_) => Span::styled("[url] ", Style::default().fg(Color::Blue)),
    };
    let title = Line::from(vec![
        cover_span,
        Span::styled(card.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
    ]);
    let mut meta = vec![Span::styled(
        format!("   Created {} • {}", card.created_label, card.page_count_label()),
        Style::default().fg(Color::Gray),
    )];
    match &card.cover {
        CardCover::Image { summary } => {
            meta.push(Span::styled(
                format!(" • {summary}"),
                Style::default().fg(Color::DarkGray),
            ));
        }
        CardCover::Link(url) => {
            meta.push(Span::styled(
                format!(" • {url}"),
                Style::default().fg(Color::DarkGray),
            ));
        }
        CardCover::Color(_) => {}
    }
    ListItem::new(vec![title, Line::from(meta), Line::from("")])
}

fn draw_loading(frame: &mut Frame, area: Rect) {
    let frame_index = (OffsetDateTime::now_utc().millisecond() / 250) as usize % SPINNER.len();
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("{} Opening notebook…", SPINNER[frame_index]),
            Style::default().fg(Color::Cyan),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn draw_editor(frame: &mut Frame, area: Rect, editor: &PageEditor) {
    let session = editor.session();
    let page_area = if session.focus_mode {
        area
    } else {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(3)])
            .split(area);
        frame.render_widget(Paragraph::new(build_toolbar(editor)), rows[0]);
        rows[1]
    };

    let inner_width = page_area.width.saturating_sub(2) as usize;
    let inner_height = page_area.height.saturating_sub(2);
    let current = editor.current_page();
    let page_bg = parse_hex_color(editor.page_color()).unwrap_or(Color::Reset);

    let mut lines: Vec<Line> = Vec::new();
    let mut header_row = 0usize;
    let mut cursor_row = 0usize;
    let mut cursor_col = 0usize;
    for (index, page) in editor.pages().iter().enumerate() {
        if index == current {
            header_row = lines.len();
        }
        lines.push(page_header(index, index == current));
        if index == current {
            let (row, col) = cursor_row_col(page, inner_width);
            cursor_row = lines.len() + row;
            cursor_col = col;
        }
        let ink: HashSet<usize> = editor
            .ink_drops()
            .iter()
            .filter(|drop| drop.page == index)
            .map(|drop| page.content().prev_boundary(drop.offset))
            .collect();
        lines.extend(page_lines(page.content(), &ink, inner_width));
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "[ + Add page (Ctrl-n) ]",
        Style::default().fg(Color::DarkGray),
    )));

    let height = inner_height as usize;
    let scroll = if height == 0 || cursor_row < header_row + height {
        header_row
    } else {
        cursor_row + 1 - height
    };

    let paragraph = Paragraph::new(lines)
        .style(Style::default().bg(page_bg).fg(contrast_fg(page_bg)))
        .block(
            Block::default()
                .title(format!(" {} ", editor.name()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .scroll((scroll as u16, 0));
    frame.render_widget(Clear, page_area);
    frame.render_widget(paragraph, page_area);

    if inner_width > 0 && height > 0 && cursor_row >= scroll && cursor_row - scroll < height {
        frame.set_cursor(
            page_area.x + 1 + cursor_col as u16,
            page_area.y + 1 + (cursor_row - scroll) as u16,
        );
    }
}

fn page_header(index: usize, current: bool) -> Line<'static> {
    let style = if current {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC)
    };
    Line::from(Span::styled(format!("── Page {} ──", index + 1), style))
}

fn build_toolbar(editor: &PageEditor) -> Line<'static> {
    let session = editor.session();
    let fonts = FontRegistry::default();
    let pens = PenPalette::default();
    let pen_label = pens
        .all()
        .iter()
        .find(|swatch| swatch.value.eq_ignore_ascii_case(&session.pen_color))
        .map(|swatch| swatch.label)
        .unwrap_or("Custom");
    let key = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let muted = Style::default().fg(Color::Gray);
    Line::from(vec![
        Span::styled("Font ", muted),
        Span::styled(fonts.label_for(&session.current_font).to_string(), key),
        Span::styled("  Pen ", muted),
        Span::styled(
            "● ",
            Style::default().fg(parse_hex_color(&session.pen_color).unwrap_or(Color::White)),
        ),
        Span::styled(pen_label.to_string(), key),
        Span::styled(
            "  │ ^F font • ^P pen • ^N page • ^E export • ^Y copy • F2 focus • ^D delete",
            muted,
        ),
    ])
}

/// Visual lines for a page, hard-wrapped at `width` columns: one span per style
/// change, newlines split lines, and freshly inked graphemes emphasised.
fn page_lines(content: &RichText, ink: &HashSet<usize>, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Vec<(String, Style)>> = vec![Vec::new()];
    let mut col = 0usize;
    let mut offset = 0;
    for run in content.coalesced() {
        let base = match run.style.color.as_deref().and_then(parse_hex_color) {
            Some(color) => Style::default().fg(color),
            None => Style::default(),
        };
        for (idx, grapheme) in run.text.grapheme_indices(true) {
            if grapheme == "\n" {
                lines.push(Vec::new());
                col = 0;
                continue;
            }
            let glyph_width = UnicodeWidthStr::width(grapheme);
            if width > 0 && glyph_width > 0 && col + glyph_width > width {
                lines.push(Vec::new());
                col = 0;
            }
            col += glyph_width;
            let style = if ink.contains(&(offset + idx)) {
                base.add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                base
            };
            let Some(line) = lines.last_mut() else {
                continue;
            };
            match line.last_mut() {
                Some((text, last_style)) if *last_style == style => text.push_str(grapheme),
                _ => line.push((grapheme.to_string(), style)),
            }
        }
        offset += run.text.len();
    }
    lines
        .into_iter()
        .map(|segments| {
            Line::from(
                segments
                    .into_iter()
                    .map(|(text, style)| Span::styled(text, style))
                    .collect::<Vec<_>>(),
            )
        })
        .collect()
}

/// Row and column of the cursor within the wrapped page, matching [`page_lines`].
fn cursor_row_col(page: &PageBuffer, width: usize) -> (usize, usize) {
    let text = page.text();
    let cursor = page.cursor().min(text.len());
    let mut row = 0usize;
    let mut col = 0usize;
    for grapheme in text[..cursor].graphemes(true) {
        if grapheme == "\n" {
            row += 1;
            col = 0;
            continue;
        }
        let glyph_width = UnicodeWidthStr::width(grapheme);
        if width > 0 && glyph_width > 0 && col + glyph_width > width {
            row += 1;
            col = 0;
        }
        col += glyph_width;
    }
    if width > 0 && col >= width {
        row += 1;
        col = 0;
    }
    (row, col)
}

fn build_status_line(state: &AppState, editor: Option<&PageEditor>) -> Text<'static> {
    let mut spans = Vec::new();
    let keys = match (&state.route, editor) {
        (Route::Editor, Some(editor)) => {
            spans.push(Span::styled(
                editor.name().to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(format!(
                " | Page {}/{}",
                editor.current_page() + 1,
                editor.pages().len()
            )));
            if editor.session().focus_mode {
                spans.push(Span::raw(" | "));
                spans.push(Span::styled(
                    "Focus",
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ));
            }
            push_autosave_status(&mut spans, editor.autosave_status());
            "Esc notebooks • PgUp/PgDn pages • ^S save • F1 help • ^Q quit"
        }
        (Route::Loading { .. }, _) => {
            spans.push(Span::raw("Loading…"));
            "Ctrl-c quit"
        }
        _ => {
            let total = state.list.len();
            let position = if state.list.is_empty() {
                "0/0".to_string()
            } else {
                format!("{}/{}", state.list.selected + 1, total)
            };
            spans.push(Span::raw(format!("Notebooks: {total}")));
            spans.push(Span::raw(" | Selected: "));
            spans.push(Span::styled(
                position,
                Style::default().add_modifier(Modifier::BOLD),
            ));
            "j/k move • Enter open • n new • d delete • ? help • q quit"
        }
    };

    let keys_line = Line::from(vec![
        Span::styled(
            "Keys: ",
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(keys, Style::default().fg(Color::DarkGray)),
    ]);
    Text::from(vec![Line::from(spans), keys_line])
}

fn push_autosave_status(spans: &mut Vec<Span<'static>>, status: AutoSaveStatus) {
    match status {
        AutoSaveStatus::Disabled => spans.push(Span::raw(" | Autosave: disabled")),
        AutoSaveStatus::Inactive => spans.push(Span::raw(" | Autosave: idle")),
        AutoSaveStatus::Idle { last_saved_at, .. } => {
            spans.push(Span::raw(" | Autosave: saved"));
            if let Some(ts) = last_saved_at {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(
                    format_time_short(ts),
                    Style::default().fg(Color::Gray),
                ));
            }
        }
        AutoSaveStatus::Pending { since, .. } => {
            spans.push(Span::raw(" | Autosave: "));
            spans.push(Span::styled(
                "pending",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(" since "));
            spans.push(Span::styled(
                format_time_short(since),
                Style::default().fg(Color::Gray),
            ));
        }
        AutoSaveStatus::Error { message, .. } => {
            spans.push(Span::raw(" | Autosave: "));
            spans.push(Span::styled(
                format!("error ({message})"),
                Style::default().fg(Color::Red),
            ));
        }
    }
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn render_toasts(frame: &mut Frame, state: &AppState) {
    let screen = frame.size();
    for (row, toast) in state.toasts.iter().enumerate() {
        let text = format!(" {} ", toast.message);
        let width = (UnicodeWidthStr::width(text.as_str()) as u16 + 2).min(screen.width);
        let y = 1 + row as u16 * 3;
        if y + 3 > screen.height {
            break;
        }
        let area = Rect::new(screen.width.saturating_sub(width + 1), y, width, 3);
        let color = match toast.kind {
            ToastKind::Success => Color::Green,
            ToastKind::Error => Color::Red,
            ToastKind::Info => Color::Cyan,
        };
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(text).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            ),
            area,
        );
    }
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    match state.overlay() {
        Some(OverlayState::Create(dialog)) => render_create_dialog(frame, dialog),
        Some(OverlayState::ConfirmDelete(confirm)) => {
            let area = centered_rect(50, 25, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Are you sure you want to delete this notebook?",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    confirm.name.clone(),
                    Style::default().fg(Color::Yellow),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "y/Enter delete • n/Esc cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title("Delete Notebook")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::FontPicker(picker)) => {
            let fonts = FontRegistry::default();
            let labels: Vec<Line> = fonts
                .all()
                .iter()
                .map(|font| Line::from(font.label))
                .collect();
            render_picker(frame, "Font", labels, picker);
        }
        Some(OverlayState::PenPicker(picker)) => {
            let pens = PenPalette::default();
            let labels: Vec<Line> = pens
                .all()
                .iter()
                .map(|pen| {
                    Line::from(vec![
                        Span::styled(
                            "● ",
                            Style::default().fg(parse_hex_color(pen.value).unwrap_or(Color::White)),
                        ),
                        Span::raw(pen.label),
                    ])
                })
                .collect();
            render_picker(frame, "Pen Color", labels, picker);
        }
        Some(OverlayState::ExportMenu(picker)) => {
            let labels: Vec<Line> = EXPORT_FORMATS
                .iter()
                .map(|format| Line::from(format!("Export as {}", format.label())))
                .collect();
            render_picker(frame, "Export", labels, picker);
        }
        Some(OverlayState::Help) => {
            let area = centered_rect(60, 60, frame.size());
            frame.render_widget(Clear, area);
            let rows = [
                ("Notebooks", ""),
                ("  j/k, arrows", "move selection"),
                ("  Enter", "open notebook"),
                ("  n", "new notebook"),
                ("  d", "delete notebook"),
                ("Editor", ""),
                ("  typing", "write with the current pen"),
                ("  PgUp/PgDn", "previous/next page"),
                ("  Ctrl-n", "add page"),
                ("  Ctrl-f / Ctrl-p", "font / pen color"),
                ("  Ctrl-e", "export PDF or DOCX"),
                ("  Ctrl-y", "copy page to clipboard"),
                ("  F2", "focus mode"),
                ("  Ctrl-s", "save now"),
                ("  Esc", "back to notebooks"),
            ];
            let lines: Vec<Line> = rows
                .iter()
                .map(|(keys, what)| {
                    if what.is_empty() {
                        Line::from(Span::styled(
                            *keys,
                            Style::default().add_modifier(Modifier::BOLD),
                        ))
                    } else {
                        Line::from(vec![
                            Span::styled(format!("{keys:<20}"), Style::default().fg(Color::Cyan)),
                            Span::raw(*what),
                        ])
                    }
                })
                .collect();
            let paragraph = Paragraph::new(lines).block(
                Block::default()
                    .title("Help")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn render_picker(frame: &mut Frame, title: &str, labels: Vec<Line<'static>>, picker: &Picker) {
    let area = centered_rect(40, 40, frame.size());
    frame.render_widget(Clear, area);
    let items: Vec<ListItem> = labels.into_iter().map(ListItem::new).collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▶ ");
    let mut state = ListState::default();
    state.select(Some(picker.index));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_create_dialog(frame: &mut Frame, dialog: &CreateDialog) {
    let area = centered_rect(60, 50, frame.size());
    frame.render_widget(Clear, area);
    let focused = |field: DialogField| {
        if dialog.field == field {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        }
    };

    let mut name = dialog.name.clone();
    if dialog.field == DialogField::Name {
        name.push('▌');
    }
    let mut lines = vec![
        Line::from(Span::styled("Name", focused(DialogField::Name))),
        Line::from(name),
        Line::from(""),
        Line::from(Span::styled("Cover", focused(DialogField::CoverType))),
        cover_type_line(dialog.cover_type),
        Line::from(""),
    ];

    let input_style = focused(DialogField::CoverInput);
    match dialog.visible_section() {
        CoverType::Color => {
            lines.push(Line::from(Span::styled("Page color (←/→)", input_style)));
            let palette = PageColorPalette::default();
            let swatches: Vec<Span> = palette
                .all()
                .iter()
                .enumerate()
                .flat_map(|(index, swatch)| {
                    let color = parse_hex_color(swatch.value).unwrap_or(Color::Gray);
                    let marker = if index == dialog.color_index { "[██]" } else { " ██ " };
                    [Span::styled(marker, Style::default().fg(color)), Span::raw(" ")]
                })
                .collect();
            lines.push(Line::from(swatches));
            lines.push(Line::from(Span::styled(
                palette
                    .all()
                    .get(dialog.color_index)
                    .map(|swatch| swatch.label)
                    .unwrap_or_default(),
                Style::default().fg(Color::Gray),
            )));
        }
        CoverType::Image => {
            lines.push(Line::from(Span::styled(
                "Image file (Ctrl-o to load)",
                input_style,
            )));
            let mut path = dialog.image_path.clone();
            if dialog.field == DialogField::CoverInput {
                path.push('▌');
            }
            lines.push(Line::from(path));
            let status = match &dialog.image {
                Some(image) => format!("{} • {} KB", image.mime, image.size.div_ceil(1024)),
                None => "No image selected".to_string(),
            };
            lines.push(Line::from(Span::styled(status, Style::default().fg(Color::Gray))));
        }
        CoverType::Link => {
            lines.push(Line::from(Span::styled("Image URL", input_style)));
            let mut link = dialog.link.clone();
            if dialog.field == DialogField::CoverInput {
                link.push('▌');
            }
            lines.push(Line::from(link));
        }
    }

    lines.push(Line::from(""));
    if let Some(error) = &dialog.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        "Tab next field • Enter create • Esc cancel",
        Style::default().fg(Color::Gray),
    )));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Create New Notebook")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn cover_type_line(selected: CoverType) -> Line<'static> {
    let spans: Vec<Span> = [
        (CoverType::Color, "Color"),
        (CoverType::Image, "Image"),
        (CoverType::Link, "Link"),
    ]
    .into_iter()
    .flat_map(|(cover, label)| {
        let span = if cover == selected {
            Span::styled(
                format!("({label})"),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!(" {label} "), Style::default().fg(Color::Gray))
        };
        [span, Span::raw(" ")]
    })
    .collect();
    Line::from(spans)
}

/// `#rrggbb` or `#rgb` to a terminal color.
fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.trim().strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some(Color::Rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        3 => {
            let expand = |s: &str| channel(s).map(|v| v * 17);
            Some(Color::Rgb(
                expand(&hex[0..1])?,
                expand(&hex[1..2])?,
                expand(&hex[2..3])?,
            ))
        }
        _ => None,
    }
}

/// Default text color that stays readable on the page background.
fn contrast_fg(bg: Color) -> Color {
    match bg {
        Color::Rgb(r, g, b) => {
            let luma = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
            if luma > 128_000 {
                Color::Black
            } else {
                Color::White
            }
        }
        _ => Color::Reset,
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use crate::config::{AppConfig, DEFAULT_FONT};
    use crate::editor::CursorMove;
    use crate::notebook::{CoverSelection, NotebookRepository};
    use crate::richtext::RunStyle;
    use crate::storage::test_support::init_storage;

    #[test]
    fn hex_colors_parse_long_and_short_forms() {
        assert_eq!(parse_hex_color("#f5f1e7"), Some(Color::Rgb(0xf5, 0xf1, 0xe7)));
        assert_eq!(parse_hex_color("#fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(parse_hex_color("#12345g"), None);
    }

    #[test]
    fn light_pages_get_dark_text() {
        assert_eq!(contrast_fg(Color::Rgb(0xf5, 0xf1, 0xe7)), Color::Black);
        assert_eq!(contrast_fg(Color::Rgb(0x2f, 0x36, 0x40)), Color::White);
    }

    #[test]
    fn page_lines_split_on_newlines_and_keep_pen_colors() {
        let mut content = RichText::default();
        let end = content.insert(0, "ab\nc", RunStyle::pen("#a4161a", "'Lora', serif"));
        content.insert(end, "d", RunStyle::pen("#000000", "'Lora', serif"));

        let lines = page_lines(&content, &HashSet::new(), 40);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].spans.len(), 1);
        assert_eq!(lines[0].spans[0].content, "ab");
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Rgb(0xa4, 0x16, 0x1a)));
        assert_eq!(lines[1].spans.len(), 2);
        assert_eq!(lines[1].spans[1].style.fg, Some(Color::Rgb(0, 0, 0)));
    }

    #[test]
    fn fresh_ink_is_emphasised() {
        let mut content = RichText::default();
        content.insert(0, "hey", RunStyle::pen("#000000", "'Lora', serif"));
        let ink: HashSet<usize> = [2].into_iter().collect();

        let lines = page_lines(&content, &ink, 40);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].spans[1].content, "y");
        assert!(lines[0].spans[1]
            .style
            .add_modifier
            .contains(Modifier::UNDERLINED));
    }

    #[test]
    fn long_lines_hard_wrap_at_page_width() {
        let mut content = RichText::default();
        content.insert(0, "cdefgh", RunStyle::pen("#000000", "'Lora', serif"));
        let lines = page_lines(&content, &HashSet::new(), 5);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].spans[0].content, "cdefg");
        assert_eq!(lines[1].spans[0].content, "h");
    }

    #[test]
    fn cursor_follows_lines_and_wraps() {
        let page = PageBuffer::from_html("ab<br>cdefgh");
        assert_eq!(cursor_row_col(&page, 5), (2, 1));

        let page = PageBuffer::from_html("abcde");
        assert_eq!(cursor_row_col(&page, 5), (1, 0));

        let page = PageBuffer::from_html("");
        assert_eq!(cursor_row_col(&page, 5), (0, 0));
    }

    fn render_editor(editor: &PageEditor, state: &AppState) -> anyhow::Result<()> {
        let mut terminal = Terminal::new(TestBackend::new(60, 16))?;
        let mut list_state = ListState::default();
        terminal.draw(|frame| draw_app(frame, state, Some(editor), &mut list_state))?;
        Ok(())
    }

    #[test]
    fn editor_renders_after_ink_is_edited_away() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut repo = NotebookRepository::load(storage, DEFAULT_FONT)?;
        let id = repo.create("Ink", "#f5f1e7", CoverSelection::Color)?;
        let mut editor = PageEditor::new(id, &AppConfig::default(), false);
        let now = Instant::now();
        assert!(editor.load(&repo, now)?);
        let mut state = AppState::new(&repo, Duration::from_secs(3));
        state.route = Route::Editor;

        editor.insert_text("a", now);
        editor.backspace(now);
        render_editor(&editor, &state)?;

        editor.insert_text("a", now);
        editor.move_cursor(CursorMove::Home);
        editor.insert_text("é", now);
        render_editor(&editor, &state)?;
        assert_eq!(editor.pages()[0].text(), "éa");
        Ok(())
    }
}
