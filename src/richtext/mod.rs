use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

pub const PEN_CLASS: &str = "pen-text";

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(/?)([A-Za-z][A-Za-z0-9]*)([^>]*)>").expect("tag pattern is valid")
});
static STYLE_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)style\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("style pattern is valid")
});
static COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|;)\s*color\s*:\s*([^;]+)").expect("color pattern is valid")
});
static FONT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|;)\s*font-family\s*:\s*([^;]+)").expect("font pattern is valid")
});
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z]+);").expect("entity pattern is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub color: Option<String>,
    pub font: Option<String>,
}

impl RunStyle {
    pub fn pen(color: &str, font: &str) -> Self {
        Self {
            color: Some(color.to_string()),
            font: Some(font.to_string()),
        }
    }

    pub fn is_plain(&self) -> bool {
        self.color.is_none() && self.font.is_none()
    }

    fn css(&self) -> String {
        let mut parts = Vec::with_capacity(2);
        if let Some(color) = &self.color {
            parts.push(format!("color: {color}"));
        }
        if let Some(font) = &self.font {
            parts.push(format!("font-family: {font}"));
        }
        parts.join("; ")
    }

    fn merged_with(&self, inner: RunStyle) -> RunStyle {
        RunStyle {
            color: inner.color.or_else(|| self.color.clone()),
            font: inner.font.or_else(|| self.font.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyledRun<'a> {
    pub text: &'a str,
    pub style: &'a RunStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    len: usize,
    style: RunStyle,
}

/// Plain text plus a style for every byte of it.
///
/// `spans` always covers `text` exactly. Each insertion keeps its own span so
/// adjacent keystrokes stay distinct runs until serialization coalesces them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    text: String,
    spans: Vec<Span>,
}

impl RichText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_html(html: &str) -> Self {
        let mut out = RichText::new();
        let mut stack: Vec<(String, RunStyle)> = Vec::new();
        let mut last = 0;

        for caps in TAG_RE.captures_iter(html) {
            let Some(whole) = caps.get(0) else { continue };
            let current = stack.last().map(|(_, s)| s.clone()).unwrap_or_default();
            out.push_raw(&decode_entities(&html[last..whole.start()]), &current);
            last = whole.end();

            let closing = !caps[1].is_empty();
            let name = caps[2].to_ascii_lowercase();
            let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            match (closing, name.as_str()) {
                (false, "br") => out.push_raw("\n", &current),
                (false, "div" | "p") => {
                    if !out.text.is_empty() && !out.text.ends_with('\n') {
                        out.push_raw("\n", &current);
                    }
                    if !attrs.trim_end().ends_with('/') {
                        stack.push((name, current.merged_with(parse_style(attrs))));
                    }
                }
                (false, "span" | "font" | "b" | "i" | "em" | "strong" | "u") => {
                    if !attrs.trim_end().ends_with('/') {
                        stack.push((name, current.merged_with(parse_style(attrs))));
                    }
                }
                (true, _) => {
                    if let Some(pos) = stack.iter().rposition(|(open, _)| *open == name) {
                        stack.truncate(pos);
                    }
                }
                _ => {}
            }
        }
        let current = stack.last().map(|(_, s)| s.clone()).unwrap_or_default();
        out.push_raw(&decode_entities(&html[last..]), &current);
        out
    }

    pub fn to_html(&self) -> String {
        let mut html = String::with_capacity(self.text.len() * 2);
        for run in self.coalesced() {
            let body = escape_html(run.text).replace('\n', "<br>");
            if run.style.is_plain() {
                html.push_str(&body);
            } else {
                html.push_str(&format!(
                    "<span class=\"{PEN_CLASS}\" style=\"{}\">{body}</span>",
                    escape_attr(&run.style.css())
                ));
            }
        }
        html
    }

    pub fn plain_text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn runs(&self) -> impl Iterator<Item = StyledRun<'_>> {
        let mut offset = 0;
        self.spans.iter().map(move |span| {
            let text = &self.text[offset..offset + span.len];
            offset += span.len;
            StyledRun {
                text,
                style: &span.style,
            }
        })
    }

    pub fn coalesced(&self) -> Vec<StyledRun<'_>> {
        let mut merged: Vec<(Range<usize>, &RunStyle)> = Vec::new();
        let mut offset = 0;
        for span in &self.spans {
            let range = offset..offset + span.len;
            offset += span.len;
            match merged.last_mut() {
                Some((prev, style)) if **style == span.style => prev.end = range.end,
                _ => merged.push((range, &span.style)),
            }
        }
        merged
            .into_iter()
            .map(|(range, style)| StyledRun {
                text: &self.text[range],
                style,
            })
            .collect()
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    pub fn insert(&mut self, at: usize, text: &str, style: RunStyle) -> usize {
        if text.is_empty() {
            return at;
        }
        let at = at.min(self.text.len());
        let index = self.split_at(at);
        self.text.insert_str(at, text);
        self.spans.insert(
            index,
            Span {
                len: text.len(),
                style,
            },
        );
        at + text.len()
    }

    pub fn remove(&mut self, range: Range<usize>) {
        let start = range.start.min(self.text.len());
        let end = range.end.min(self.text.len());
        if start >= end {
            return;
        }
        let first = self.split_at(start);
        let last = self.split_at(end);
        self.spans.drain(first..last);
        self.text.drain(start..end);
    }

    pub fn prev_boundary(&self, cursor: usize) -> usize {
        prev_grapheme_boundary(&self.text, cursor)
    }

    pub fn next_boundary(&self, cursor: usize) -> usize {
        next_grapheme_boundary(&self.text, cursor)
    }

    /// Splits the span containing `at` so a span boundary sits exactly there,
    /// returning the index of the first span starting at or after `at`.
    fn split_at(&mut self, at: usize) -> usize {
        let mut offset = 0;
        for index in 0..self.spans.len() {
            if offset == at {
                return index;
            }
            let len = self.spans[index].len;
            if at < offset + len {
                let head = at - offset;
                let tail = Span {
                    len: len - head,
                    style: self.spans[index].style.clone(),
                };
                self.spans[index].len = head;
                self.spans.insert(index + 1, tail);
                return index + 1;
            }
            offset += len;
        }
        self.spans.len()
    }

    fn push_raw(&mut self, text: &str, style: &RunStyle) {
        if text.is_empty() {
            return;
        }
        self.text.push_str(text);
        match self.spans.last_mut() {
            Some(last) if last.style == *style => last.len += text.len(),
            _ => self.spans.push(Span {
                len: text.len(),
                style: style.clone(),
            }),
        }
    }
}

pub fn plain_text(html: &str) -> String {
    RichText::from_html(html).text
}

fn parse_style(attrs: &str) -> RunStyle {
    let Some(caps) = STYLE_ATTR_RE.captures(attrs) else {
        return RunStyle::default();
    };
    let Some(css) = caps.get(1).or_else(|| caps.get(2)) else {
        return RunStyle::default();
    };
    let css = decode_entities(css.as_str());
    let pick = |re: &Regex| {
        re.captures(&css)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
    };
    RunStyle {
        color: pick(&COLOR_RE),
        font: pick(&FONT_RE),
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;")
}

fn floor_char_boundary(text: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(text.len());
    while !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    cursor
}

pub(crate) fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    let cursor = floor_char_boundary(text, cursor);
    if cursor == 0 {
        return 0;
    }
    let mut last = 0;
    for (idx, _) in text[..cursor].grapheme_indices(true) {
        last = idx;
    }
    last
}

pub(crate) fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    let cursor = floor_char_boundary(text, cursor);
    if cursor >= text.len() {
        return text.len();
    }
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}

pub(crate) fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

pub(crate) fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .find('\n')
        .map(|idx| cursor + idx)
        .unwrap_or(text.len())
}

pub(crate) fn column_at(text: &str, line_start: usize, cursor: usize) -> usize {
    text[line_start..cursor].graphemes(true).count()
}

pub(crate) fn position_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let line_end = line_end(text, line_start);
    let mut position = line_start;
    for (count, grapheme) in text[line_start..line_end].graphemes(true).enumerate() {
        if count >= column {
            return position;
        }
        position += grapheme.len();
    }
    line_end
}

#[cfg(test)]
mod tests {
    use super::*;

    const INK: &str = "#1a3c8e";
    const FONT: &str = "'Caveat', cursive";

    #[test]
    fn typed_units_are_separate_runs_until_serialized() {
        let mut text = RichText::new();
        let mut cursor = text.insert(0, "H", RunStyle::pen(INK, FONT));
        cursor = text.insert(cursor, "i", RunStyle::pen(INK, FONT));
        assert_eq!(cursor, 2);
        assert_eq!(text.span_count(), 2);
        assert_eq!(
            text.to_html(),
            "<span class=\"pen-text\" style=\"color: #1a3c8e; font-family: 'Caveat', cursive\">Hi</span>"
        );
    }

    #[test]
    fn insertion_in_the_middle_splits_the_surrounding_run() {
        let mut text = RichText::from_html("Hello");
        let after = text.insert(2, "X", RunStyle::pen("#a4161a", FONT));
        assert_eq!(after, 3);
        assert_eq!(text.plain_text(), "HeXllo");
        let runs: Vec<_> = text.runs().map(|r| r.text).collect();
        assert_eq!(runs, vec!["He", "X", "llo"]);
        assert!(text.to_html().starts_with("He<span"));
        assert!(text.to_html().ends_with("</span>llo"));
    }

    #[test]
    fn remove_drops_emptied_runs() {
        let mut text = RichText::new();
        let at = text.insert(0, "ab", RunStyle::pen(INK, FONT));
        let end = text.insert(at, "cd", RunStyle::pen("#a4161a", FONT));
        text.remove(1..3);
        assert_eq!(text.plain_text(), "ad");
        assert_eq!(text.span_count(), 2);
        text.remove(0..end);
        assert!(text.is_empty());
        assert_eq!(text.span_count(), 0);
        assert_eq!(text.to_html(), "");
    }

    #[test]
    fn parses_pen_spans_line_breaks_and_entities() {
        let html = "<span class=\"pen-text\" style=\"color: #1a3c8e; font-family: 'Caveat', cursive\">Fish &amp; chips</span><br>plain&nbsp;&#x41;";
        let text = RichText::from_html(html);
        assert_eq!(text.plain_text(), "Fish & chips\nplain A");
        let runs = text.coalesced();
        assert_eq!(runs[0].style.color.as_deref(), Some(INK));
        assert_eq!(runs[0].style.font.as_deref(), Some(FONT));
        assert!(runs.last().is_some_and(|run| run.style.is_plain()));
    }

    #[test]
    fn block_markup_becomes_newlines() {
        assert_eq!(plain_text("first<div>second</div><div>third</div>"), "first\nsecond\nthird");
        assert_eq!(plain_text("<p>one</p><p>two</p>"), "one\ntwo");
        assert_eq!(plain_text("<b>bold</b> <i>it</i>"), "bold it");
    }

    #[test]
    fn serialized_fragment_reloads_to_the_same_text_and_styles() {
        let mut text = RichText::from_html("a < b");
        let end = text.len();
        text.insert(end, "\n\"quoted\"", RunStyle::pen(INK, FONT));
        let html = text.to_html();
        assert!(html.contains("a &lt; b"));
        assert!(html.contains("<br>"));

        let reloaded = RichText::from_html(&html);
        assert_eq!(reloaded.plain_text(), text.plain_text());
        assert_eq!(reloaded.to_html(), html);
    }

    #[test]
    fn nested_spans_inherit_outer_style() {
        let text = RichText::from_html(
            "<span style=\"color: red\">a<span style=\"font-family: Lora\">b</span>c</span>d",
        );
        let runs = text.coalesced();
        assert_eq!(runs.len(), 4);
        assert_eq!(runs[1].style.color.as_deref(), Some("red"));
        assert_eq!(runs[1].style.font.as_deref(), Some("Lora"));
        assert_eq!(runs[2].style.font, None);
        assert!(runs[3].style.is_plain());
    }

    #[test]
    fn grapheme_helpers_step_over_combined_characters() {
        let text = "e\u{301}x\ny";
        assert_eq!(next_grapheme_boundary(text, 0), 3);
        assert_eq!(prev_grapheme_boundary(text, 3), 0);
        assert_eq!(line_start(text, 5), 5);
        assert_eq!(line_end(text, 0), 4);
        assert_eq!(column_at(text, 0, 4), 2);
        assert_eq!(position_for_column(text, 0, 1), 3);
        assert_eq!(position_for_column(text, 0, 9), 4);
    }

    #[test]
    fn grapheme_helpers_clamp_stale_offsets() {
        assert_eq!(prev_grapheme_boundary("", 1), 0);
        assert_eq!(next_grapheme_boundary("", 3), 0);
        assert_eq!(prev_grapheme_boundary("éa", 1), 0);
        assert_eq!(next_grapheme_boundary("éa", 1), 2);
        assert_eq!(RichText::new().prev_boundary(4), 0);
    }
}
