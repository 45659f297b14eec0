use std::collections::VecDeque;
use std::time::{Duration, Instant};

use strum::IntoEnumIterator;

use crate::config::palette::{FontRegistry, PageColorPalette, PenPalette};
use crate::export::ExportFormat;
use crate::notebook::cover::CoverImage;
use crate::notebook::{CoverSelection, CoverStyle, CoverType, Notebook, NotebookId, NotebookRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct Toasts {
    items: VecDeque<Toast>,
    ttl: Duration,
}

impl Toasts {
    const MAX_VISIBLE: usize = 3;

    pub fn new(ttl: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            ttl,
        }
    }

    pub fn push<S: Into<String>>(&mut self, kind: ToastKind, message: S, now: Instant) {
        let message = message.into();
        match kind {
            ToastKind::Error => tracing::warn!(%message, "toast"),
            _ => tracing::debug!(%message, "toast"),
        }
        self.items.push_back(Toast {
            kind,
            message,
            expires_at: now + self.ttl,
        });
        while self.items.len() > Self::MAX_VISIBLE {
            self.items.pop_front();
        }
    }

    pub fn success<S: Into<String>>(&mut self, message: S, now: Instant) {
        self.push(ToastKind::Success, message, now);
    }

    pub fn error<S: Into<String>>(&mut self, message: S, now: Instant) {
        self.push(ToastKind::Error, message, now);
    }

    pub fn info<S: Into<String>>(&mut self, message: S, now: Instant) {
        self.push(ToastKind::Info, message, now);
    }

    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|toast| toast.expires_at > now);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.items.back()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardCover {
    Color(String),
    Image { summary: String },
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookCard {
    pub id: NotebookId,
    pub name: String,
    pub created_label: String,
    pub page_count: usize,
    pub cover: CardCover,
}

impl NotebookCard {
    pub fn from_notebook(id: &NotebookId, notebook: &Notebook) -> Self {
        let cover = match notebook.cover() {
            CoverStyle::SolidColor(color) => CardCover::Color(color.to_string()),
            CoverStyle::Image(data) => CardCover::Image {
                summary: data_uri_summary(data),
            },
            CoverStyle::Link(url) => CardCover::Link(url.to_string()),
        };
        Self {
            id: id.clone(),
            name: notebook.name.clone(),
            created_label: id.created_label(),
            page_count: notebook.page_count(),
            cover,
        }
    }

    pub fn page_count_label(&self) -> String {
        page_count_label(self.page_count)
    }
}

pub fn page_count_label(count: usize) -> String {
    if count == 1 {
        "1 page".to_string()
    } else {
        format!("{count} pages")
    }
}

fn data_uri_summary(data: &str) -> String {
    let mime = data
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .filter(|mime| !mime.is_empty())
        .unwrap_or("image");
    format!("{mime} cover")
}

#[derive(Debug, Default)]
pub struct ListView {
    pub cards: Vec<NotebookCard>,
    pub selected: usize,
}

impl ListView {
    pub fn refresh(&mut self, repo: &NotebookRepository) {
        let previous = self.selected_id().cloned();
        self.cards = repo
            .list()
            .map(|(id, notebook)| NotebookCard::from_notebook(id, notebook))
            .collect();
        match previous {
            Some(id) => self.select_id(&id),
            None => self.selected = 0,
        }
        self.normalize_selection();
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn selected(&self) -> Option<&NotebookCard> {
        self.cards.get(self.selected)
    }

    pub fn selected_id(&self) -> Option<&NotebookId> {
        self.selected().map(|card| &card.id)
    }

    pub fn select_id(&mut self, id: &NotebookId) {
        if let Some(index) = self.cards.iter().position(|card| &card.id == id) {
            self.selected = index;
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.cards.is_empty() {
            self.selected = 0;
            return;
        }
        let len = self.cards.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1);
        self.selected = next as usize;
    }

    fn normalize_selection(&mut self) {
        if self.cards.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.cards.len() {
            self.selected = self.cards.len() - 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogField {
    Name,
    CoverType,
    CoverInput,
}

impl DialogField {
    fn next(self) -> Self {
        match self {
            DialogField::Name => DialogField::CoverType,
            DialogField::CoverType => DialogField::CoverInput,
            DialogField::CoverInput => DialogField::Name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateDialog {
    pub name: String,
    pub cover_type: CoverType,
    pub color_index: usize,
    pub image_path: String,
    pub image: Option<CoverImage>,
    pub link: String,
    pub field: DialogField,
    pub error: Option<String>,
}

impl CreateDialog {
    pub fn new(default_page_color: &str) -> Self {
        Self {
            name: String::new(),
            cover_type: CoverType::Color,
            color_index: PageColorPalette::default()
                .position(default_page_color)
                .unwrap_or(0),
            image_path: String::new(),
            image: None,
            link: String::new(),
            field: DialogField::Name,
            error: None,
        }
    }

    pub fn visible_section(&self) -> CoverType {
        self.cover_type
    }

    pub fn page_color(&self) -> &'static str {
        let palette = PageColorPalette::default();
        palette
            .all()
            .get(self.color_index)
            .map(|swatch| swatch.value)
            .unwrap_or(crate::config::DEFAULT_PAGE_COLOR)
    }

    pub fn cycle_cover_type(&mut self, forward: bool) {
        let all: Vec<CoverType> = CoverType::iter().collect();
        let index = all.iter().position(|t| *t == self.cover_type).unwrap_or(0);
        let next = if forward {
            (index + 1) % all.len()
        } else {
            (index + all.len() - 1) % all.len()
        };
        self.cover_type = all[next];
    }

    pub fn cycle_color(&mut self, forward: bool) {
        let len = PageColorPalette::default().all().len();
        self.color_index = if forward {
            (self.color_index + 1) % len
        } else {
            (self.color_index + len - 1) % len
        };
    }

    pub fn next_field(&mut self) {
        self.field = self.field.next();
    }

    pub fn push_char(&mut self, ch: char) {
        match (self.field, self.cover_type) {
            (DialogField::Name, _) => self.name.push(ch),
            (DialogField::CoverInput, CoverType::Image) => self.image_path.push(ch),
            (DialogField::CoverInput, CoverType::Link) => self.link.push(ch),
            _ => {}
        }
        self.error = None;
    }

    pub fn pop_char(&mut self) {
        match (self.field, self.cover_type) {
            (DialogField::Name, _) => {
                self.name.pop();
            }
            (DialogField::CoverInput, CoverType::Image) => {
                self.image_path.pop();
            }
            (DialogField::CoverInput, CoverType::Link) => {
                self.link.pop();
            }
            _ => {}
        }
    }

    pub fn selection(&self) -> CoverSelection {
        match self.cover_type {
            CoverType::Color => CoverSelection::Color,
            CoverType::Image => {
                CoverSelection::Image(self.image.as_ref().map(|image| image.data_uri.clone()))
            }
            CoverType::Link => CoverSelection::Link(Some(self.link.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirm {
    pub id: NotebookId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picker {
    pub index: usize,
    pub len: usize,
}

impl Picker {
    pub fn new(index: usize, len: usize) -> Self {
        Self {
            index: index.min(len.saturating_sub(1)),
            len,
        }
    }

    pub fn move_by(&mut self, delta: isize) {
        if self.len == 0 {
            return;
        }
        let len = self.len as isize;
        self.index = (self.index as isize + delta).rem_euclid(len) as usize;
    }
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    Create(CreateDialog),
    ConfirmDelete(DeleteConfirm),
    FontPicker(Picker),
    PenPicker(Picker),
    ExportMenu(Picker),
    Help,
}

impl OverlayState {
    pub fn font_picker(current_font: &str) -> Self {
        let fonts = FontRegistry::default();
        OverlayState::FontPicker(Picker::new(
            fonts.position(current_font).unwrap_or(0),
            fonts.all().len(),
        ))
    }

    pub fn pen_picker(current_color: &str) -> Self {
        let pens = PenPalette::default();
        OverlayState::PenPicker(Picker::new(
            pens.position(current_color).unwrap_or(0),
            pens.all().len(),
        ))
    }

    pub fn export_menu() -> Self {
        OverlayState::ExportMenu(Picker::new(0, EXPORT_FORMATS.len()))
    }
}

pub const EXPORT_FORMATS: [ExportFormat; 2] = [ExportFormat::Pdf, ExportFormat::Docx];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    List,
    Loading { id: NotebookId, until: Instant },
    Editor,
}

pub struct AppState {
    pub route: Route,
    pub list: ListView,
    pub toasts: Toasts,
    overlay: Option<OverlayState>,
}

impl AppState {
    pub fn new(repo: &NotebookRepository, toast_ttl: Duration) -> Self {
        let mut list = ListView::default();
        list.refresh(repo);
        Self {
            route: Route::List,
            list,
            toasts: Toasts::new(toast_ttl),
            overlay: None,
        }
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut OverlayState> {
        self.overlay.as_mut()
    }

    pub fn open_overlay(&mut self, overlay: OverlayState) {
        self.overlay = Some(overlay);
    }

    pub fn close_overlay(&mut self) -> Option<OverlayState> {
        self.overlay.take()
    }

    pub fn create_dialog_mut(&mut self) -> Option<&mut CreateDialog> {
        match self.overlay.as_mut() {
            Some(OverlayState::Create(dialog)) => Some(dialog),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.route, Route::Loading { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_FONT, DEFAULT_PAGE_COLOR};

    #[test]
    fn create_dialog_defaults_to_color_cover() {
        let dialog = CreateDialog::new(DEFAULT_PAGE_COLOR);
        assert_eq!(dialog.name, "");
        assert_eq!(dialog.cover_type, CoverType::Color);
        assert_eq!(dialog.page_color(), "#f5f1e7");
        assert_eq!(dialog.selection(), CoverSelection::Color);
    }

    #[test]
    fn switching_cover_type_shows_exactly_one_section() {
        let mut dialog = CreateDialog::new(DEFAULT_PAGE_COLOR);
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(dialog.visible_section());
            dialog.cycle_cover_type(true);
        }
        assert_eq!(seen, vec![CoverType::Color, CoverType::Image, CoverType::Link]);
        assert_eq!(dialog.visible_section(), CoverType::Color);
        dialog.cycle_cover_type(false);
        assert_eq!(dialog.visible_section(), CoverType::Link);
    }

    #[test]
    fn typed_characters_go_to_the_focused_input() {
        let mut dialog = CreateDialog::new(DEFAULT_PAGE_COLOR);
        dialog.push_char('A');
        dialog.cycle_cover_type(true);
        dialog.cycle_cover_type(true);
        dialog.next_field();
        dialog.next_field();
        for ch in "https://x.io/c.png".chars() {
            dialog.push_char(ch);
        }
        assert_eq!(dialog.name, "A");
        assert_eq!(dialog.link, "https://x.io/c.png");
        assert_eq!(
            dialog.selection(),
            CoverSelection::Link(Some("https://x.io/c.png".into()))
        );
    }

    #[test]
    fn image_selection_without_upload_has_no_data() {
        let mut dialog = CreateDialog::new(DEFAULT_PAGE_COLOR);
        dialog.cycle_cover_type(true);
        assert_eq!(dialog.selection(), CoverSelection::Image(None));
    }

    #[test]
    fn cards_follow_cover_precedence_and_pluralize_pages() {
        let id = NotebookId::from_millis(1_700_000_000_000);
        let mut notebook = Notebook::new(
            "Trip",
            "#f5f1e7",
            CoverSelection::Image(None),
            DEFAULT_FONT,
        );
        let card = NotebookCard::from_notebook(&id, &notebook);
        assert_eq!(card.cover, CardCover::Color("#f5f1e7".into()));
        assert_eq!(card.page_count_label(), "1 page");
        assert_eq!(card.created_label, "Nov 14, 2023");

        notebook.cover_image = Some("data:image/png;base64,AAAA".into());
        notebook.pages.push(String::new());
        let card = NotebookCard::from_notebook(&id, &notebook);
        assert_eq!(
            card.cover,
            CardCover::Image {
                summary: "image/png cover".into()
            }
        );
        assert_eq!(card.page_count_label(), "2 pages");
    }

    #[test]
    fn toasts_expire_and_cap() {
        let now = Instant::now();
        let mut toasts = Toasts::new(Duration::from_secs(4));
        for n in 0..5 {
            toasts.info(format!("toast {n}"), now);
        }
        assert_eq!(toasts.iter().count(), 3);
        assert_eq!(toasts.latest().map(|t| t.message.as_str()), Some("toast 4"));
        toasts.prune(now + Duration::from_secs(4));
        assert_eq!(toasts.iter().count(), 0);
    }

    #[test]
    fn pickers_wrap_around() {
        let mut picker = Picker::new(0, 3);
        picker.move_by(-1);
        assert_eq!(picker.index, 2);
        picker.move_by(2);
        assert_eq!(picker.index, 1);
    }
}
