use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::config::palette::{FontRegistry, PenPalette};
use crate::config::AppConfig;
use crate::editor::{CursorMove, PageEditor};
use crate::export::{ExportFormat, Exporter};
use crate::journaling::{AutoSaveEvent, SaveTrigger};
use crate::notebook::cover::CoverError;
use crate::notebook::{CoverType, NotebookId, NotebookRepository};
use crate::storage::StorageHandle;
use crate::ui;

mod actions;
pub mod state;

pub use state::{
    AppState, CardCover, CreateDialog, DeleteConfirm, DialogField, NotebookCard, OverlayState,
    Picker, Route, Toast, ToastKind, EXPORT_FORMATS,
};

const MAX_NAME_LEN: usize = 120;

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    OpenSelected,
    NewNotebook,
    DeleteSelected,
    ShowHelp,
}

enum EditorAction {
    Back,
    Quit,
    Save,
    AddPage,
    FontPicker,
    PenPicker,
    ExportMenu,
    Copy,
    ToggleFocus,
    Delete,
    Help,
}

pub struct App {
    pub config: Arc<AppConfig>,
    repo: NotebookRepository,
    state: AppState,
    editor: Option<PageEditor>,
    exporter: Exporter,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
    loading_delay: Duration,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        storage: StorageHandle,
        open: Option<NotebookId>,
    ) -> Result<Self> {
        let repo = NotebookRepository::load(storage, &config.editor.default_font)
            .context("loading notebooks for initial state")?;
        let state = AppState::new(&repo, Duration::from_secs(config.ui.toast_secs));
        let mut list_state = ListState::default();
        if !state.list.is_empty() {
            list_state.select(Some(state.list.selected));
        }
        let exporter = Exporter::from_config(&config.export);
        let mut app = Self {
            tick_rate: Duration::from_millis(config.ui.tick_ms.max(10)),
            loading_delay: Duration::from_millis(config.ui.loading_delay_ms),
            config,
            repo,
            state,
            editor: None,
            exporter,
            list_state,
            should_quit: false,
        };
        if let Some(id) = open {
            app.open_notebook(id, Instant::now());
        }
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn editor(&self) -> Option<&PageEditor> {
        self.editor.as_ref()
    }

    pub fn repository(&self) -> &NotebookRepository {
        &self.repo
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if self.state.list.is_empty() {
                        self.list_state.select(None);
                    } else {
                        self.list_state.select(Some(self.state.list.selected));
                    }
                    ui::draw_app(frame, &self.state, self.editor.as_ref(), &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key_at(key, Instant::now());
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.tick_at(Instant::now());
                last_tick = Instant::now();
            }
        }
        self.leave_editor(Instant::now());
        Ok(())
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.state.toasts.prune(now);
        if let Route::Loading { id, until } = &self.state.route {
            if now >= *until {
                let id = id.clone();
                self.finish_loading(id, now);
            }
        }
        let event = self
            .editor
            .as_mut()
            .and_then(|editor| editor.poll(&mut self.repo, now));
        if let Some(event) = event {
            self.handle_autosave_event(event, now);
        }
    }

    pub fn handle_key_at(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.leave_editor(now);
            self.should_quit = true;
            return;
        }
        if self.handle_overlay_key(key, now) {
            return;
        }
        match self.state.route {
            Route::Loading { .. } => {}
            Route::Editor => self.handle_editor_key(key, now),
            Route::List => {
                if let Some(action) = list_action(key) {
                    self.handle_action(action, now);
                }
            }
        }
    }

    fn handle_action(&mut self, action: Action, now: Instant) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.list.move_selection(1),
            Action::SelectPrevious => self.state.list.move_selection(-1),
            Action::OpenSelected => match self.state.list.selected_id().cloned() {
                Some(id) => self.open_notebook(id, now),
                None => self.state.toasts.error("Please select a notebook first", now),
            },
            Action::NewNotebook => {
                let dialog = CreateDialog::new(&self.config.editor.default_page_color);
                self.state.open_overlay(OverlayState::Create(dialog));
            }
            Action::DeleteSelected => match self.state.list.selected() {
                Some(card) => {
                    let confirm = DeleteConfirm {
                        id: card.id.clone(),
                        name: card.name.clone(),
                    };
                    self.state.open_overlay(OverlayState::ConfirmDelete(confirm));
                }
                None => self.state.toasts.error("Please select a notebook first", now),
            },
            Action::ShowHelp => self.state.open_overlay(OverlayState::Help),
        }
    }

    fn open_notebook(&mut self, id: NotebookId, now: Instant) {
        tracing::debug!(id = %id, "opening notebook");
        self.state.route = Route::Loading {
            id,
            until: now + self.loading_delay,
        };
    }

    fn finish_loading(&mut self, id: NotebookId, now: Instant) {
        let focus_mode = self.repo.storage().load_focus_mode().unwrap_or_else(|err| {
            tracing::warn!(?err, "failed to read focus mode, defaulting to off");
            false
        });
        let mut editor = PageEditor::new(id, &self.config, focus_mode);
        match editor.load(&self.repo, now) {
            Ok(true) => {
                self.editor = Some(editor);
                self.state.route = Route::Editor;
            }
            Ok(false) => {
                self.state.route = Route::List;
                self.refresh_list();
                self.state
                    .toasts
                    .error("Please select a notebook first", now);
            }
            Err(err) => {
                tracing::error!(?err, "failed to open notebook");
                self.state.route = Route::List;
                self.state.toasts.error("Failed to open notebook", now);
            }
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent, now: Instant) {
        if let Some(action) = editor_action(key) {
            self.handle_editor_action(action, now);
            return;
        }
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        match key.code {
            KeyCode::Char(ch) if plain => {
                let mut buf = [0u8; 4];
                editor.insert_text(ch.encode_utf8(&mut buf), now);
            }
            KeyCode::Enter => {
                editor.insert_newline(now);
            }
            KeyCode::Backspace => {
                editor.backspace(now);
            }
            KeyCode::Delete => {
                editor.delete_forward(now);
            }
            KeyCode::Left => {
                editor.move_cursor(CursorMove::Left);
            }
            KeyCode::Right => {
                editor.move_cursor(CursorMove::Right);
            }
            KeyCode::Up => {
                editor.move_cursor(CursorMove::Up);
            }
            KeyCode::Down => {
                editor.move_cursor(CursorMove::Down);
            }
            KeyCode::Home => {
                editor.move_cursor(CursorMove::Home);
            }
            KeyCode::End => {
                editor.move_cursor(CursorMove::End);
            }
            KeyCode::PageUp => {
                editor.prev_page();
            }
            KeyCode::PageDown => {
                editor.next_page();
            }
            _ => {}
        }
    }

    fn handle_editor_action(&mut self, action: EditorAction, now: Instant) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        match action {
            EditorAction::Back => {
                self.leave_editor(now);
                self.state.route = Route::List;
            }
            EditorAction::Quit => {
                self.leave_editor(now);
                self.should_quit = true;
            }
            EditorAction::Save => {
                if let Some(event) = editor.save(&mut self.repo, SaveTrigger::Manual, now) {
                    self.handle_autosave_event(event, now);
                }
            }
            EditorAction::AddPage => match editor.add_page(&mut self.repo, now) {
                Ok(Some(event)) => self.handle_autosave_event(event, now),
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(?err, "failed to add page");
                    self.state.toasts.error("Failed to add page", now);
                }
            },
            EditorAction::FontPicker => {
                let overlay = OverlayState::font_picker(&editor.session().current_font);
                self.state.open_overlay(overlay);
            }
            EditorAction::PenPicker => {
                let overlay = OverlayState::pen_picker(&editor.session().pen_color);
                self.state.open_overlay(overlay);
            }
            EditorAction::ExportMenu => self.state.open_overlay(OverlayState::export_menu()),
            EditorAction::Copy => {
                let text = editor.current_page_text().unwrap_or_default().to_string();
                match actions::copy_page(&text) {
                    Ok(()) => self
                        .state
                        .toasts
                        .success("Page content copied to clipboard!", now),
                    Err(err) => {
                        tracing::warn!(?err, "clipboard copy failed");
                        self.state.toasts.error("Failed to copy to clipboard", now);
                    }
                }
            }
            EditorAction::ToggleFocus => match editor.toggle_focus_mode(self.repo.storage()) {
                Ok(true) => self.state.toasts.success("Focus mode activated", now),
                Ok(false) => self.state.toasts.success("Focus mode deactivated", now),
                Err(err) => {
                    tracing::error!(?err, "failed to persist focus mode");
                    self.state.toasts.error("Failed to save focus mode", now);
                }
            },
            EditorAction::Delete => {
                let confirm = DeleteConfirm {
                    id: editor.notebook_id().clone(),
                    name: editor.name().to_string(),
                };
                self.state.open_overlay(OverlayState::ConfirmDelete(confirm));
            }
            EditorAction::Help => self.state.open_overlay(OverlayState::Help),
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent, now: Instant) -> bool {
        let Some(overlay) = self.state.overlay_mut() else {
            return false;
        };
        match overlay {
            OverlayState::Create(_) => self.handle_create_key(key, now),
            OverlayState::ConfirmDelete(_) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    if let Some(OverlayState::ConfirmDelete(confirm)) = self.state.close_overlay() {
                        self.delete_notebook(confirm.id, now);
                    }
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.state.close_overlay();
                }
                _ => {}
            },
            OverlayState::FontPicker(picker) => {
                if let Some(index) = picker_key(picker, key) {
                    self.state.close_overlay();
                    if let Some(index) = index {
                        self.apply_font(index, now);
                    }
                }
            }
            OverlayState::PenPicker(picker) => {
                if let Some(index) = picker_key(picker, key) {
                    self.state.close_overlay();
                    let pens = PenPalette::default();
                    if let (Some(index), Some(editor)) = (index, self.editor.as_mut()) {
                        if let Some(swatch) = pens.all().get(index) {
                            editor.set_pen_color(swatch.value);
                        }
                    }
                }
            }
            OverlayState::ExportMenu(picker) => {
                if let Some(index) = picker_key(picker, key) {
                    self.state.close_overlay();
                    if let Some(format) = index.and_then(|i| EXPORT_FORMATS.get(i).copied()) {
                        self.export_current(format, now);
                    }
                }
            }
            OverlayState::Help => {
                self.state.close_overlay();
            }
        }
        true
    }

    fn handle_create_key(&mut self, key: KeyEvent, now: Instant) {
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        match key.code {
            KeyCode::Esc => {
                self.state.close_overlay();
            }
            KeyCode::Enter => self.submit_create(now),
            KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.load_dialog_image(now);
            }
            _ => {
                let Some(dialog) = self.state.create_dialog_mut() else {
                    return;
                };
                match key.code {
                    KeyCode::Tab | KeyCode::BackTab => dialog.next_field(),
                    KeyCode::Left | KeyCode::Right => {
                        let forward = key.code == KeyCode::Right;
                        match (dialog.field, dialog.cover_type) {
                            (DialogField::CoverType, _) => dialog.cycle_cover_type(forward),
                            (_, CoverType::Color) => dialog.cycle_color(forward),
                            _ => {}
                        }
                    }
                    KeyCode::Backspace => dialog.pop_char(),
                    KeyCode::Char(ch) if plain => {
                        if dialog.field != DialogField::Name || dialog.name.len() < MAX_NAME_LEN {
                            dialog.push_char(ch);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn load_dialog_image(&mut self, now: Instant) -> bool {
        let max_bytes = self.config.cover.max_image_bytes;
        let Some(dialog) = self.state.create_dialog_mut() else {
            return false;
        };
        match actions::attach_cover_image(&dialog.image_path, max_bytes) {
            Ok(image) => {
                tracing::debug!(mime = image.mime, size = image.size, "cover image selected");
                dialog.image = Some(image);
                self.state.toasts.success("Image selected successfully", now);
                true
            }
            Err(err) => {
                dialog.image = None;
                if let CoverError::Unreadable { .. } = err {
                    tracing::warn!(%err, "cover image unreadable");
                }
                self.state.toasts.error(err.to_string(), now);
                false
            }
        }
    }

    fn submit_create(&mut self, now: Instant) {
        let Some(dialog) = self.state.create_dialog_mut() else {
            return;
        };
        if dialog.name.trim().is_empty() {
            dialog.error = Some("Please enter a notebook name".to_string());
            return;
        }
        let needs_image = dialog.cover_type == CoverType::Image
            && dialog.image.is_none()
            && !dialog.image_path.trim().is_empty();
        if needs_image && !self.load_dialog_image(now) {
            return;
        }
        let Some(OverlayState::Create(dialog)) = self.state.close_overlay() else {
            return;
        };
        match actions::ActionDispatcher::new(&mut self.repo).create_from_dialog(&dialog) {
            Ok(id) => {
                self.refresh_list();
                self.state.list.select_id(&id);
                self.state.toasts.success("Notebook created successfully!", now);
                self.open_notebook(id, now);
            }
            Err(err) => {
                tracing::error!(?err, "failed to create notebook");
                self.state.toasts.error("Failed to create notebook", now);
                self.state.open_overlay(OverlayState::Create(dialog));
            }
        }
    }

    fn delete_notebook(&mut self, id: NotebookId, now: Instant) {
        let open_here = self
            .editor
            .as_ref()
            .is_some_and(|editor| editor.notebook_id() == &id);
        let result = match (open_here, self.editor.as_mut()) {
            (true, Some(editor)) => editor.delete_notebook(&mut self.repo),
            _ => actions::ActionDispatcher::new(&mut self.repo).delete(&id),
        };
        match result {
            Ok(_) => {
                if open_here {
                    self.editor = None;
                    self.state.route = Route::List;
                }
                self.refresh_list();
                self.state.toasts.success("Notebook deleted successfully!", now);
            }
            Err(err) => {
                tracing::error!(?err, id = %id, "failed to delete notebook");
                self.state.toasts.error("Failed to delete notebook", now);
            }
        }
    }

    fn apply_font(&mut self, index: usize, now: Instant) {
        let fonts = FontRegistry::default();
        let (Some(font), Some(editor)) = (fonts.all().get(index), self.editor.as_mut()) else {
            return;
        };
        match editor.change_font(&mut self.repo, font.value, now) {
            Ok(event) => {
                self.state.toasts.success("Font updated!", now);
                if let Some(event) = event {
                    self.handle_autosave_event(event, now);
                }
            }
            Err(err) => {
                tracing::error!(?err, "failed to change font");
                self.state.toasts.error("Failed to update font", now);
            }
        }
    }

    fn export_current(&mut self, format: ExportFormat, now: Instant) {
        let Some(editor) = self.editor.as_mut() else {
            self.state.toasts.error("Please select a notebook first", now);
            return;
        };
        if editor.has_unsaved_changes() {
            if let Some(event) = editor.save(&mut self.repo, SaveTrigger::Manual, now) {
                self.handle_autosave_event(event, now);
            }
        }
        let Some(id) = self.editor.as_ref().map(|editor| editor.notebook_id().clone()) else {
            return;
        };
        let dispatcher = actions::ActionDispatcher::new(&mut self.repo);
        match dispatcher.export(&self.exporter, &id, format) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "notebook exported");
                self.state
                    .toasts
                    .success(format!("{} exported successfully!", format.label()), now);
            }
            Err(err) => {
                tracing::error!(?err, %format, "export failed");
                self.state
                    .toasts
                    .error(format!("Failed to export {}", format.label()), now);
            }
        }
    }

    fn leave_editor(&mut self, now: Instant) {
        let Some(mut editor) = self.editor.take() else {
            return;
        };
        if let Some(event) = editor.navigate_away(&mut self.repo, now) {
            self.handle_autosave_event(event, now);
        }
        self.refresh_list();
    }

    fn refresh_list(&mut self) {
        self.state.list.refresh(&self.repo);
    }

    fn handle_autosave_event(&mut self, event: AutoSaveEvent, now: Instant) {
        match event {
            AutoSaveEvent::Saved {
                notebook_id,
                trigger,
                ..
            } => {
                tracing::trace!(id = %notebook_id, %trigger, "autosave completed");
            }
            AutoSaveEvent::Error {
                notebook_id,
                trigger,
                message,
            } => {
                tracing::warn!(id = %notebook_id, %trigger, %message, "autosave error");
                self.state
                    .toasts
                    .error(format!("Autosave failed: {message}"), now);
            }
        }
    }
}

fn list_action(key: KeyEvent) -> Option<Action> {
    let plain = !key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
    match key.code {
        KeyCode::Char('q') if plain => Some(Action::Quit),
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Right => Some(Action::SelectNext),
        KeyCode::Char('k') | KeyCode::Up | KeyCode::Left => Some(Action::SelectPrevious),
        KeyCode::Enter => Some(Action::OpenSelected),
        KeyCode::Char('n') if plain => Some(Action::NewNotebook),
        KeyCode::Char('d') if plain => Some(Action::DeleteSelected),
        KeyCode::Delete => Some(Action::DeleteSelected),
        KeyCode::Char('?') | KeyCode::F(1) => Some(Action::ShowHelp),
        _ => None,
    }
}

fn editor_action(key: KeyEvent) -> Option<EditorAction> {
    if key.code == KeyCode::Esc {
        return Some(EditorAction::Back);
    }
    match key.code {
        KeyCode::F(1) => return Some(EditorAction::Help),
        KeyCode::F(2) => return Some(EditorAction::ToggleFocus),
        _ => {}
    }
    if !key.modifiers.contains(KeyModifiers::CONTROL) {
        return None;
    }
    match key.code {
        KeyCode::Char('q') => Some(EditorAction::Quit),
        KeyCode::Char('s') => Some(EditorAction::Save),
        KeyCode::Char('n') => Some(EditorAction::AddPage),
        KeyCode::Char('f') => Some(EditorAction::FontPicker),
        KeyCode::Char('p') => Some(EditorAction::PenPicker),
        KeyCode::Char('e') => Some(EditorAction::ExportMenu),
        KeyCode::Char('y') => Some(EditorAction::Copy),
        KeyCode::Char('d') => Some(EditorAction::Delete),
        _ => None,
    }
}

/// `None` keeps the picker open; `Some(None)` cancels; `Some(Some(i))` picks `i`.
fn picker_key(picker: &mut Picker, key: KeyEvent) -> Option<Option<usize>> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            picker.move_by(1);
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            picker.move_by(-1);
            None
        }
        KeyCode::Enter => Some(Some(picker.index)),
        KeyCode::Esc => Some(None),
        _ => None,
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}
