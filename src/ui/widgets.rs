use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::domain::Entry;

/// Single-line text field with a blinking cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
	value: String,
	cursor: usize,
	placeholder: String,
	char_limit: usize,
	focused: bool,
	cursor_visible: bool,
}

impl TextInput {
	pub fn new(placeholder: impl Into<String>, char_limit: usize) -> Self {
		Self {
			placeholder: placeholder.into(),
			char_limit,
			..Self::default()
		}
	}

	pub fn value(&self) -> &str {
		&self.value
	}

	pub fn set_value(&mut self, value: &str) {
		self.value = value.chars().take(self.limit()).collect();
		self.cursor = self.value.chars().count();
	}

	pub fn clear(&mut self) {
		self.value.clear();
		self.cursor = 0;
	}

	pub fn focus(&mut self) {
		self.focused = true;
		self.cursor_visible = true;
	}

	pub fn blur(&mut self) {
		self.focused = false;
		self.cursor_visible = false;
	}

	pub fn is_focused(&self) -> bool {
		self.focused
	}

	pub fn blink(&mut self) {
		if self.focused {
			self.cursor_visible = !self.cursor_visible;
		}
	}

	pub fn show_cursor(&mut self) {
		if self.focused {
			self.cursor_visible = true;
		}
	}

	/// Applies an editing key. Returns `false` when the key is not for the input.
	pub fn handle_key(&mut self, key: KeyEvent) -> bool {
		if !self.focused {
			return false;
		}

		let control = key.modifiers.contains(KeyModifiers::CONTROL);
		match key.code {
			KeyCode::Char('u') if control => {
				let tail = self.value.chars().skip(self.cursor).collect::<String>();
				self.value = tail;
				self.cursor = 0;
			}
			KeyCode::Char(value) if !control && !key.modifiers.contains(KeyModifiers::ALT) => {
				if self.value.chars().count() >= self.limit() {
					return true;
				}
				let at = self.byte_offset(self.cursor);
				self.value.insert(at, value);
				self.cursor += 1;
			}
			KeyCode::Backspace => {
				if self.cursor > 0 {
					let at = self.byte_offset(self.cursor - 1);
					self.value.remove(at);
					self.cursor -= 1;
				}
			}
			KeyCode::Delete => {
				if self.cursor < self.value.chars().count() {
					let at = self.byte_offset(self.cursor);
					self.value.remove(at);
				}
			}
			KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
			KeyCode::Right => self.cursor = (self.cursor + 1).min(self.value.chars().count()),
			KeyCode::Home => self.cursor = 0,
			KeyCode::End => self.cursor = self.value.chars().count(),
			_ => return false,
		}

		self.cursor_visible = true;
		true
	}

	pub fn spans(&self) -> Vec<Span<'static>> {
		let cursor_style = Style::default().add_modifier(Modifier::REVERSED);
		let show_cursor = self.focused && self.cursor_visible;

		if self.value.is_empty() {
			let mut spans = Vec::new();
			if show_cursor {
				spans.push(Span::styled(" ", cursor_style));
			}
			spans.push(Span::styled(
				self.placeholder.clone(),
				Style::default().fg(Color::DarkGray),
			));
			return spans;
		}

		if !show_cursor {
			return vec![Span::raw(self.value.clone())];
		}

		let before = self.value.chars().take(self.cursor).collect::<String>();
		let under = self.value.chars().nth(self.cursor).map(String::from).unwrap_or_else(|| " ".to_string());
		let after = self.value.chars().skip(self.cursor + 1).collect::<String>();
		vec![
			Span::raw(before),
			Span::styled(under, cursor_style),
			Span::raw(after),
		]
	}

	fn limit(&self) -> usize {
		if self.char_limit == 0 {
			usize::MAX
		} else {
			self.char_limit
		}
	}

	fn byte_offset(&self, char_index: usize) -> usize {
		self.value
			.char_indices()
			.nth(char_index)
			.map(|(offset, _)| offset)
			.unwrap_or(self.value.len())
	}
}

/// Scrollable block of pre-rendered lines.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
	lines: Vec<Line<'static>>,
	offset: usize,
	height: usize,
}

impl Viewport {
	pub fn set_content(&mut self, lines: Vec<Line<'static>>) {
		self.lines = lines;
		self.offset = self.offset.min(self.max_offset());
	}

	pub fn set_height(&mut self, height: usize) {
		self.height = height;
		self.offset = self.offset.min(self.max_offset());
	}

	pub fn lines(&self) -> &[Line<'static>] {
		&self.lines
	}

	pub fn offset(&self) -> usize {
		self.offset
	}

	pub fn goto_top(&mut self) {
		self.offset = 0;
	}

	pub fn scroll_by(&mut self, delta: isize) {
		let target = self.offset as isize + delta;
		self.offset = (target.max(0) as usize).min(self.max_offset());
	}

	pub fn handle_key(&mut self, key: KeyEvent) -> bool {
		let page = self.height.max(1) as isize;
		match key.code {
			KeyCode::Up | KeyCode::Char('k') => self.scroll_by(-1),
			KeyCode::Down | KeyCode::Char('j') => self.scroll_by(1),
			KeyCode::PageUp | KeyCode::Char('b') => self.scroll_by(-page),
			KeyCode::PageDown | KeyCode::Char('f') | KeyCode::Char(' ') => self.scroll_by(page),
			KeyCode::Home | KeyCode::Char('g') => self.goto_top(),
			KeyCode::End | KeyCode::Char('G') => self.offset = self.max_offset(),
			_ => return false,
		}
		true
	}

	fn max_offset(&self) -> usize {
		self.lines.len().saturating_sub(self.height.max(1))
	}
}

/// Digit-driven list selection with an optional two-digit prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuickSelect {
	pending: Option<u32>,
}

impl QuickSelect {
	/// Index selected by `digit` in a list of `len` items, if any.
	pub fn press(&mut self, digit: u32, len: usize) -> Option<usize> {
		if let Some(prefix) = self.pending.take() {
			let combined = (prefix * 10 + digit) as usize;
			if len >= 10 && (1..=len).contains(&combined) {
				return Some(combined - 1);
			}
		}

		let ordinal = digit as usize;
		if len >= 10 && ordinal >= 1 && ordinal * 10 <= len {
			self.pending = Some(digit);
		}
		(1..=len).contains(&ordinal).then(|| ordinal - 1)
	}

	pub fn pending(&self) -> Option<u32> {
		self.pending
	}

	pub fn reset(&mut self) {
		self.pending = None;
	}
}

#[derive(Debug, Clone)]
pub struct SelectState<T> {
	pub title: String,
	pub options: Vec<SelectOption<T>>,
	pub selected: usize,
}

impl<T> SelectState<T> {
	pub fn new(title: impl Into<String>, options: Vec<SelectOption<T>>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
		}
	}

	pub fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	pub fn selected_option(&self) -> Option<&SelectOption<T>> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
pub struct SelectOption<T> {
	pub label: String,
	pub value: T,
	pub style: Style,
}

impl<T> SelectOption<T> {
	pub fn new(label: impl Into<String>, value: T, style: Style) -> Self {
		Self {
			label: label.into(),
			value,
			style,
		}
	}
}

/// Entries of one project with a case-insensitive content filter.
#[derive(Debug, Clone)]
pub struct EntryList {
	entries: Vec<Entry>,
	visible: Vec<usize>,
	selected: usize,
	filter: TextInput,
	filtering: bool,
}

impl Default for EntryList {
	fn default() -> Self {
		Self {
			entries: Vec::new(),
			visible: Vec::new(),
			selected: 0,
			filter: TextInput::new("type to filter", 64),
			filtering: false,
		}
	}
}

impl EntryList {
	/// Replaces the entries, keeping the selection on the same entry if it survives.
	pub fn set_entries(&mut self, entries: Vec<Entry>) {
		let selected_id = self.selected_entry().map(|entry| entry.id.clone());
		self.entries = entries;
		self.apply_filter();
		if let Some(id) = selected_id {
			if let Some(position) = self.visible.iter().position(|&index| self.entries[index].id == id) {
				self.selected = position;
			}
		}
	}

	pub fn visible(&self) -> impl Iterator<Item = &Entry> {
		self.visible.iter().map(|&index| &self.entries[index])
	}

	pub fn len(&self) -> usize {
		self.visible.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn selected(&self) -> usize {
		self.selected
	}

	pub fn selected_entry(&self) -> Option<&Entry> {
		self.visible.get(self.selected).map(|&index| &self.entries[index])
	}

	pub fn move_selection(&mut self, delta: i32) {
		if self.visible.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.visible.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	pub fn filter(&self) -> &TextInput {
		&self.filter
	}

	pub fn filter_mut(&mut self) -> &mut TextInput {
		&mut self.filter
	}

	pub fn is_filtering(&self) -> bool {
		self.filtering
	}

	pub fn has_filter(&self) -> bool {
		!self.filter.value().trim().is_empty()
	}

	pub fn start_filter(&mut self) {
		self.filtering = true;
		self.filter.focus();
	}

	pub fn finish_filter(&mut self) {
		self.filtering = false;
		self.filter.blur();
	}

	pub fn clear_filter(&mut self) {
		self.filter.clear();
		self.finish_filter();
		self.apply_filter();
	}

	pub fn handle_filter_key(&mut self, key: KeyEvent) -> bool {
		let consumed = self.filter.handle_key(key);
		if consumed {
			self.apply_filter();
		}
		consumed
	}

	fn apply_filter(&mut self) {
		let needle = self.filter.value().trim().to_lowercase();
		self.visible = self
			.entries
			.iter()
			.enumerate()
			.filter(|(_, entry)| needle.is_empty() || entry.content.to_lowercase().contains(&needle))
			.map(|(index, _)| index)
			.collect();
		self.selected = self.selected.min(self.visible.len().saturating_sub(1));
	}
}
