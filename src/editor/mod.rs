use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::config::AppConfig;
use crate::journaling::{AutoSaveEvent, AutoSaveRuntime, AutoSaveStatus, SaveTrigger};
use crate::notebook::{Notebook, NotebookId, NotebookRepository};
use crate::richtext::{self, RichText, RunStyle};
use crate::storage::StorageHandle;

pub mod phase;

pub use phase::{EditorEvent, EditorPhase, TransitionError};

pub const INK_DROP_TTL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub current_font: String,
    pub pen_color: String,
    pub focus_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InkDrop {
    pub page: usize,
    pub offset: usize,
    pub color: String,
    pub born: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct PageBuffer {
    content: RichText,
    cursor: usize,
    preferred_column: Option<usize>,
}

impl PageBuffer {
    pub fn from_html(html: &str) -> Self {
        let content = RichText::from_html(html);
        let cursor = content.len();
        Self {
            content,
            cursor,
            preferred_column: None,
        }
    }

    pub fn content(&self) -> &RichText {
        &self.content
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn text(&self) -> &str {
        self.content.plain_text()
    }

    pub fn to_html(&self) -> String {
        self.content.to_html()
    }

    pub fn insert_text(&mut self, text: &str, style: RunStyle) -> bool {
        if text.is_empty() {
            return false;
        }
        self.cursor = self.content.insert(self.cursor, text, style);
        self.preferred_column = None;
        true
    }

    pub fn insert_newline(&mut self, style: RunStyle) -> bool {
        self.cursor = self.content.insert(self.cursor, "\n", style);
        self.preferred_column = Some(0);
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = self.content.prev_boundary(self.cursor);
        self.content.remove(prev..self.cursor);
        self.cursor = prev;
        self.preferred_column = None;
        true
    }

    pub fn delete(&mut self) -> bool {
        let next = self.content.next_boundary(self.cursor);
        if next == self.cursor {
            return false;
        }
        self.content.remove(self.cursor..next);
        self.preferred_column = None;
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = self.content.prev_boundary(self.cursor);
        self.preferred_column = None;
        true
    }

    pub fn move_right(&mut self) -> bool {
        let next = self.content.next_boundary(self.cursor);
        if next == self.cursor {
            return false;
        }
        self.cursor = next;
        self.preferred_column = None;
        true
    }

    pub fn move_home(&mut self) -> bool {
        let start = richtext::line_start(self.text(), self.cursor);
        if self.cursor == start {
            return false;
        }
        self.cursor = start;
        self.preferred_column = Some(0);
        true
    }

    pub fn move_end(&mut self) -> bool {
        let text = self.content.plain_text();
        let end = richtext::line_end(text, self.cursor);
        if self.cursor == end {
            return false;
        }
        self.preferred_column = Some(richtext::column_at(
            text,
            richtext::line_start(text, end),
            end,
        ));
        self.cursor = end;
        true
    }

    pub fn move_up(&mut self) -> bool {
        let text = self.content.plain_text();
        let current_line_start = richtext::line_start(text, self.cursor);
        let column = self
            .preferred_column
            .unwrap_or_else(|| richtext::column_at(text, current_line_start, self.cursor));
        let target = if current_line_start == 0 {
            0
        } else {
            let prev_line_start = richtext::line_start(text, current_line_start - 1);
            richtext::position_for_column(text, prev_line_start, column)
        };
        if self.cursor == target {
            return false;
        }
        self.cursor = target;
        self.preferred_column = Some(column);
        true
    }

    pub fn move_down(&mut self) -> bool {
        let text = self.content.plain_text();
        let current_line_start = richtext::line_start(text, self.cursor);
        let column = self
            .preferred_column
            .unwrap_or_else(|| richtext::column_at(text, current_line_start, self.cursor));
        let current_line_end = richtext::line_end(text, self.cursor);
        let target = if current_line_end == text.len() {
            text.len()
        } else {
            richtext::position_for_column(text, current_line_end + 1, column)
        };
        if self.cursor == target {
            return false;
        }
        self.cursor = target;
        self.preferred_column = Some(column);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
}

pub struct PageEditor {
    notebook_id: NotebookId,
    name: String,
    page_color: String,
    phase: EditorPhase,
    session: SessionState,
    pages: Vec<PageBuffer>,
    current_page: usize,
    autosave: AutoSaveRuntime,
    ink_drops: Vec<InkDrop>,
}

impl PageEditor {
    pub fn new(notebook_id: NotebookId, config: &AppConfig, focus_mode: bool) -> Self {
        Self {
            notebook_id,
            name: String::new(),
            page_color: config.editor.default_page_color.clone(),
            phase: EditorPhase::Loading,
            session: SessionState {
                current_font: config.editor.default_font.clone(),
                pen_color: config.editor.pen_color.clone(),
                focus_mode,
            },
            pages: Vec::new(),
            current_page: 0,
            autosave: AutoSaveRuntime::new(&config.auto_save),
            ink_drops: Vec::new(),
        }
    }

    /// Renders the notebook's pages. Returns `false` and leaves the editor when the
    /// notebook does not exist, so the caller can redirect to the list.
    pub fn load(&mut self, repo: &NotebookRepository, now: Instant) -> Result<bool> {
        let Some(notebook) = repo.get(&self.notebook_id) else {
            tracing::warn!(id = %self.notebook_id, "unknown notebook, redirecting to list");
            self.apply(EditorEvent::NavigateAway)?;
            return Ok(false);
        };
        self.populate(notebook);
        self.apply(EditorEvent::Loaded)?;
        repo.mark_current(&self.notebook_id)?;
        self.autosave.start_session(self.notebook_id.clone(), now);
        tracing::info!(id = %self.notebook_id, pages = self.pages.len(), "notebook opened");
        Ok(true)
    }

    fn populate(&mut self, notebook: &Notebook) {
        self.name = notebook.name.clone();
        self.page_color = notebook.page_color.clone();
        self.session.current_font = notebook.font.clone();
        self.pages = notebook
            .pages
            .iter()
            .map(|html| PageBuffer::from_html(html))
            .collect();
        if self.pages.is_empty() {
            self.pages.push(PageBuffer::default());
        }
        self.current_page = 0;
    }

    pub fn notebook_id(&self) -> &NotebookId {
        &self.notebook_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_color(&self) -> &str {
        &self.page_color
    }

    pub fn phase(&self) -> EditorPhase {
        self.phase
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn pages(&self) -> &[PageBuffer] {
        &self.pages
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn ink_drops(&self) -> &[InkDrop] {
        &self.ink_drops
    }

    pub fn autosave_status(&self) -> AutoSaveStatus {
        self.autosave.status()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.autosave.has_dirty_changes()
    }

    fn apply(&mut self, event: EditorEvent) -> Result<(), TransitionError> {
        self.phase = self.phase.transition(event)?;
        Ok(())
    }

    fn pen_style(&self) -> RunStyle {
        RunStyle::pen(&self.session.pen_color, &self.session.current_font)
    }

    fn edit_page<F>(&mut self, now: Instant, edit: F) -> bool
    where
        F: FnOnce(&mut PageBuffer, RunStyle) -> bool,
    {
        if !self.phase.accepts_input() {
            return false;
        }
        let style = self.pen_style();
        let Some(page) = self.pages.get_mut(self.current_page) else {
            return false;
        };
        let (len_before, cursor_before) = (page.content.len(), page.cursor);
        if !edit(page, style) {
            return false;
        }
        let (len_after, cursor_after) = (page.content.len(), page.cursor);
        let current = self.current_page;
        if len_after >= len_before {
            let inserted = len_after - len_before;
            for drop in self.ink_drops.iter_mut().filter(|drop| drop.page == current) {
                if drop.offset > cursor_before {
                    drop.offset += inserted;
                }
            }
        } else {
            let start = cursor_after;
            let end = start + (len_before - len_after);
            self.ink_drops.retain_mut(|drop| {
                if drop.page != current || drop.offset <= start {
                    return true;
                }
                if drop.offset <= end {
                    return false;
                }
                drop.offset -= end - start;
                true
            });
        }
        self.phase = EditorPhase::Editing;
        self.autosave.note_input(now);
        true
    }

    pub fn insert_text(&mut self, text: &str, now: Instant) -> bool {
        let inserted = self.edit_page(now, |page, style| page.insert_text(text, style));
        if inserted {
            let page = self.current_page;
            let offset = self.pages[page].cursor();
            self.ink_drops.push(InkDrop {
                page,
                offset,
                color: self.session.pen_color.clone(),
                born: now,
            });
        }
        inserted
    }

    pub fn insert_newline(&mut self, now: Instant) -> bool {
        self.edit_page(now, |page, style| page.insert_newline(style))
    }

    pub fn backspace(&mut self, now: Instant) -> bool {
        self.edit_page(now, |page, _| page.backspace())
    }

    pub fn delete_forward(&mut self, now: Instant) -> bool {
        self.edit_page(now, |page, _| page.delete())
    }

    pub fn move_cursor(&mut self, movement: CursorMove) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        let Some(page) = self.pages.get_mut(self.current_page) else {
            return false;
        };
        match movement {
            CursorMove::Left => page.move_left(),
            CursorMove::Right => page.move_right(),
            CursorMove::Up => page.move_up(),
            CursorMove::Down => page.move_down(),
            CursorMove::Home => page.move_home(),
            CursorMove::End => page.move_end(),
        }
    }

    pub fn focus_page(&mut self, index: usize) -> bool {
        if index >= self.pages.len() || index == self.current_page {
            return false;
        }
        self.current_page = index;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.focus_page(self.current_page + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        self.current_page
            .checked_sub(1)
            .is_some_and(|index| self.focus_page(index))
    }

    pub fn add_page(
        &mut self,
        repo: &mut NotebookRepository,
        now: Instant,
    ) -> Result<Option<AutoSaveEvent>> {
        if !self.phase.accepts_input() {
            return Ok(None);
        }
        let Some(number) = repo.append_page(&self.notebook_id)? else {
            return Err(anyhow!("notebook {} no longer exists", self.notebook_id));
        };
        self.pages.push(PageBuffer::default());
        self.current_page = self.pages.len() - 1;
        tracing::debug!(id = %self.notebook_id, page = number, "page added");
        self.autosave.request_structural();
        Ok(self.poll(repo, now))
    }

    pub fn change_font(
        &mut self,
        repo: &mut NotebookRepository,
        font: &str,
        now: Instant,
    ) -> Result<Option<AutoSaveEvent>> {
        if !self.phase.accepts_input() {
            return Ok(None);
        }
        self.session.current_font = font.to_string();
        repo.set_font(&self.notebook_id, font)?;
        self.autosave.request_structural();
        Ok(self.poll(repo, now))
    }

    pub fn set_pen_color(&mut self, color: &str) {
        self.session.pen_color = color.to_string();
    }

    pub fn toggle_focus_mode(&mut self, storage: &StorageHandle) -> Result<bool> {
        self.session.focus_mode = !self.session.focus_mode;
        storage
            .save_focus_mode(self.session.focus_mode)
            .context("persisting focus mode")?;
        Ok(self.session.focus_mode)
    }

    pub fn poll(&mut self, repo: &mut NotebookRepository, now: Instant) -> Option<AutoSaveEvent> {
        self.ink_drops
            .retain(|drop| now.saturating_duration_since(drop.born) < INK_DROP_TTL);
        let trigger = self.autosave.due(now)?;
        self.save(repo, trigger, now)
    }

    pub fn save(
        &mut self,
        repo: &mut NotebookRepository,
        trigger: SaveTrigger,
        now: Instant,
    ) -> Option<AutoSaveEvent> {
        if self.apply(EditorEvent::SaveStarted).is_err() {
            return None;
        }
        let pages: Vec<String> = self.pages.iter().map(PageBuffer::to_html).collect();
        let outcome = repo
            .set_pages(&self.notebook_id, pages)
            .and_then(|found| {
                if found {
                    Ok(())
                } else {
                    Err(anyhow!("notebook {} no longer exists", self.notebook_id))
                }
            });
        if let Err(err) = self.apply(EditorEvent::SaveFinished) {
            tracing::warn!(%err, "editor left the saving phase early");
        }
        tracing::trace!(id = %self.notebook_id, %trigger, "pages saved");
        self.autosave.finish(trigger, outcome, now)
    }

    pub fn delete_notebook(&mut self, repo: &mut NotebookRepository) -> Result<bool> {
        if self.phase.is_terminal() {
            return Ok(false);
        }
        let removed = repo.delete(&self.notebook_id)?;
        self.apply(EditorEvent::Deleted)?;
        self.autosave.end_session(&self.notebook_id);
        Ok(removed)
    }

    pub fn navigate_away(
        &mut self,
        repo: &mut NotebookRepository,
        now: Instant,
    ) -> Option<AutoSaveEvent> {
        if self.phase.is_terminal() {
            return None;
        }
        let event = if self.autosave.has_dirty_changes() {
            self.save(repo, SaveTrigger::Manual, now)
        } else {
            None
        };
        self.phase = EditorPhase::NavigatedAway;
        self.autosave.end_session(&self.notebook_id);
        event
    }

    pub fn current_page_text(&self) -> Option<&str> {
        self.pages.get(self.current_page).map(PageBuffer::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FONT;
    use crate::notebook::CoverSelection;
    use crate::storage::test_support::init_storage;
    use assert_matches::assert_matches;

    fn open(
        storage: &StorageHandle,
        name: &str,
    ) -> anyhow::Result<(NotebookRepository, PageEditor, Instant)> {
        let mut repo = NotebookRepository::load(storage.clone(), DEFAULT_FONT)?;
        let id = repo.create(name, "#f5f1e7", CoverSelection::Color)?;
        let mut editor = PageEditor::new(id, &AppConfig::default(), false);
        let now = Instant::now();
        assert!(editor.load(&repo, now)?);
        Ok((repo, editor, now))
    }

    fn stored_pages(repo: &NotebookRepository, id: &NotebookId) -> Vec<String> {
        repo.get(id).map(|nb| nb.pages.clone()).unwrap_or_default()
    }

    #[test]
    fn typed_page_is_saved_after_debounce() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let (mut repo, mut editor, start) = open(&storage, "Trip Journal")?;
        let id = editor.notebook_id().clone();

        for ch in ["H", "e", "l", "l", "o"] {
            assert!(editor.insert_text(ch, start));
        }
        assert_eq!(editor.phase(), EditorPhase::Editing);
        assert!(editor.poll(&mut repo, start).is_none());

        let event = editor.poll(&mut repo, start + Duration::from_millis(300));
        assert_matches!(event, Some(AutoSaveEvent::Saved { trigger: SaveTrigger::Debounced, .. }));
        let pages = stored_pages(&NotebookRepository::load(storage.clone(), DEFAULT_FONT)?, &id);
        assert_eq!(pages.len(), 1);
        assert_eq!(richtext::plain_text(&pages[0]), "Hello");
        assert!(pages[0].contains("color: #000000"));
        Ok(())
    }

    #[test]
    fn interval_save_rewrites_unchanged_pages() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let (mut repo, mut editor, start) = open(&storage, "Quiet")?;
        let id = editor.notebook_id().clone();

        let event = editor.poll(&mut repo, start + Duration::from_secs(10));
        assert_matches!(event, Some(AutoSaveEvent::Saved { trigger: SaveTrigger::Interval, .. }));
        assert_eq!(stored_pages(&repo, &id), vec![String::new()]);
        assert_eq!(editor.phase(), EditorPhase::Editing);
        Ok(())
    }

    #[test]
    fn add_page_persists_immediately_and_moves_cursor() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let (mut repo, mut editor, start) = open(&storage, "Growing")?;
        let id = editor.notebook_id().clone();
        editor.insert_text("first", start);

        let event = editor.add_page(&mut repo, start)?;
        assert_matches!(event, Some(AutoSaveEvent::Saved { trigger: SaveTrigger::Structural, .. }));
        assert_eq!(editor.current_page(), 1);

        let pages = stored_pages(&repo, &id);
        assert_eq!(pages.len(), 2);
        assert_eq!(richtext::plain_text(&pages[0]), "first");
        assert_eq!(pages[1], "");
        Ok(())
    }

    #[test]
    fn font_change_applies_to_new_text_and_persists() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let (mut repo, mut editor, start) = open(&storage, "Fonts")?;
        let id = editor.notebook_id().clone();

        editor.change_font(&mut repo, "'Caveat', cursive", start)?;
        assert_eq!(repo.get(&id).map(|nb| nb.font.as_str()), Some("'Caveat', cursive"));

        editor.set_pen_color("#a4161a");
        editor.insert_text("x", start);
        editor.save(&mut repo, SaveTrigger::Manual, start);
        let page = &stored_pages(&repo, &id)[0];
        assert!(page.contains("color: #a4161a; font-family: 'Caveat', cursive"));
        Ok(())
    }

    #[test]
    fn focus_mode_toggle_survives_reload() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let (_repo, mut editor, _) = open(&storage, "Focus")?;
        assert!(editor.toggle_focus_mode(&storage)?);
        assert!(storage.load_focus_mode()?);
        assert!(!editor.toggle_focus_mode(&storage)?);
        assert!(!storage.load_focus_mode()?);
        Ok(())
    }

    #[test]
    fn unknown_notebook_redirects() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let repo = NotebookRepository::load(storage.clone(), DEFAULT_FONT)?;
        let mut editor = PageEditor::new(
            NotebookId::from_millis(42),
            &AppConfig::default(),
            false,
        );
        assert!(!editor.load(&repo, Instant::now())?);
        assert_eq!(editor.phase(), EditorPhase::NavigatedAway);
        assert!(!editor.insert_text("x", Instant::now()));
        assert_eq!(storage.current_notebook()?, None);
        Ok(())
    }

    #[test]
    fn opening_marks_current_and_delete_clears_it() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let (mut repo, mut editor, start) = open(&storage, "Doomed")?;
        let id = editor.notebook_id().clone();
        assert_eq!(storage.current_notebook()?, Some(id.clone()));

        assert!(editor.delete_notebook(&mut repo)?);
        assert_eq!(editor.phase(), EditorPhase::Deleted);
        assert!(!repo.contains(&id));
        assert_eq!(storage.current_notebook()?, None);
        assert!(editor.poll(&mut repo, start + Duration::from_secs(20)).is_none());
        Ok(())
    }

    #[test]
    fn navigate_away_flushes_pending_edits() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let (mut repo, mut editor, start) = open(&storage, "Leaving")?;
        let id = editor.notebook_id().clone();
        editor.insert_text("late", start);

        let event = editor.navigate_away(&mut repo, start);
        assert_matches!(event, Some(AutoSaveEvent::Saved { trigger: SaveTrigger::Manual, .. }));
        assert_eq!(editor.phase(), EditorPhase::NavigatedAway);
        assert_eq!(richtext::plain_text(&stored_pages(&repo, &id)[0]), "late");
        Ok(())
    }

    #[test]
    fn ink_drops_expire_after_half_a_second() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let (mut repo, mut editor, start) = open(&storage, "Ink")?;
        editor.insert_text("a", start);
        assert_eq!(editor.ink_drops().len(), 1);
        assert_eq!(editor.ink_drops()[0].color, "#000000");

        editor.poll(&mut repo, start + Duration::from_millis(499));
        assert_eq!(editor.ink_drops().len(), 1);
        editor.poll(&mut repo, start + Duration::from_millis(500));
        assert!(editor.ink_drops().is_empty());
        Ok(())
    }

    #[test]
    fn ink_offsets_follow_edits() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let (_repo, mut editor, start) = open(&storage, "Ink")?;

        editor.insert_text("a", start);
        assert!(editor.backspace(start));
        assert!(editor.ink_drops().is_empty());

        editor.insert_text("a", start);
        editor.move_cursor(CursorMove::Home);
        editor.insert_text("é", start);
        let offsets: Vec<usize> = editor.ink_drops().iter().map(|drop| drop.offset).collect();
        assert_eq!(offsets, vec![3, 2]);

        assert!(editor.delete_forward(start));
        let offsets: Vec<usize> = editor.ink_drops().iter().map(|drop| drop.offset).collect();
        assert_eq!(offsets, vec![2]);
        Ok(())
    }

    #[test]
    fn page_buffer_cursor_moves_between_lines() {
        let mut page = PageBuffer::from_html("alpha<br>be");
        assert_eq!(page.cursor(), 8);
        assert!(page.move_up());
        assert_eq!(page.cursor(), 2);
        assert!(page.move_end());
        assert_eq!(page.cursor(), 5);
        assert!(page.move_down());
        assert_eq!(page.cursor(), 8);
        assert!(page.backspace());
        assert_eq!(page.text(), "alpha\nb");
        assert!(page.move_home());
        assert!(page.backspace());
        assert_eq!(page.text(), "alphab");
        assert!(page.move_up());
        assert_eq!(page.cursor(), 0);
        assert!(!page.move_up());
    }
}
