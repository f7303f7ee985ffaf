//! # MessageList Component
//!
//! Scrollable view of the transcript.
//!
//! ## Responsibilities
//!
//! - Display every transcript record in order
//! - Manage scrolling specific logic
//! - Track which status panels the user has opened or closed
//! - Perform efficient layout caching (Message heights)
//!
//! ## Architecture
//!
//! `MessageList` is a transient component (created each frame) that wraps
//! `&'a mut MessageListState` (persistent state) and `&'a Transcript` (props).
//!
//! Since `Component::render` takes `&mut self`, we can safely mutate the state
//! (including layout cache and scroll state) during the render pass, aligning
//! with Ratatui's `StatefulWidget` pattern.
//!
//! Only the pending record can change after it is appended, so the cache
//! re-measures from the pending index (or the index that *was* pending when
//! last measured) and trusts everything above it.

use std::collections::HashMap;

use ratatui::Frame;
use ratatui::layout::{Position, Rect, Size};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::transcript::{MessageRecord, Transcript};
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::message::MessageView;
use crate::tui::event::TuiEvent;

/// Layout and scroll state for the message list.
/// Must be persisted in the parent TuiState.
pub struct MessageListState {
    /// Scroll offset and view state
    pub scroll_state: ScrollViewState,
    /// Cached layout measurements
    pub layout: LayoutCache,
    /// When true, auto-scroll to bottom on new content
    pub stick_to_bottom: bool,
    /// Keyboard-selected record (Cursor mode or click)
    pub selected_index: Option<usize>,
    /// Record under the mouse pointer
    pub hovered_index: Option<usize>,
    /// Status panels the user toggled, keyed by record index.
    /// Wins over the record's own `expanded` flag.
    pub expanded_overrides: HashMap<usize, bool>,
    /// Pending record seen at the last sync
    watched_pending: Option<usize>,
    /// Last known viewport height (for scroll clamping between frames)
    pub viewport_height: u16,
}

impl Default for MessageListState {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageListState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            layout: LayoutCache::new(),
            stick_to_bottom: true, // Start attached to bottom
            selected_index: None,
            hovered_index: None,
            expanded_overrides: HashMap::new(),
            watched_pending: None,
            viewport_height: 0,
        }
    }

    /// Whether record `index`'s status panel is open right now.
    pub fn effective_expanded(&self, index: usize, record: &MessageRecord) -> bool {
        match record.as_assistant() {
            Some(msg) => self
                .expanded_overrides
                .get(&index)
                .copied()
                .unwrap_or(msg.status.expanded),
            None => false,
        }
    }

    /// Flip the status panel of record `index`. Returns false when the record
    /// has no visible panel to toggle.
    pub fn toggle_expanded(&mut self, index: usize, records: &[MessageRecord]) -> bool {
        let Some(record) = records.get(index) else {
            return false;
        };
        if !record.as_assistant().is_some_and(|msg| msg.status.visible) {
            return false;
        }
        let next = !self.effective_expanded(index, record);
        self.expanded_overrides.insert(index, next);
        true
    }

    /// Track the pending record. When it finalizes, the user's live toggle is
    /// dropped so the collapse on completion (or expand on error) shows.
    pub fn sync_pending(&mut self, pending: Option<usize>) {
        if let Some(prev) = self.watched_pending
            && pending != Some(prev)
        {
            self.expanded_overrides.remove(&prev);
        }
        self.watched_pending = pending;
    }

    /// Clamp scroll offset so it never exceeds the content bounds.
    /// Prevents overscrolling past the last message.
    pub fn clamp_scroll(&mut self) {
        let max_y = self.max_scroll();
        let current = self.scroll_state.offset();
        if current.y > max_y {
            self.scroll_state.set_offset(Position {
                x: current.x,
                y: max_y,
            });
        }
    }

    /// Scroll the viewport so the selected message is fully visible.
    /// If the message is taller than the viewport, align its top edge.
    pub fn scroll_to_selected(&mut self) {
        let Some(idx) = self.selected_index else {
            return;
        };
        if idx >= self.layout.prefix_heights.len() {
            return;
        }

        let item_top = if idx == 0 {
            0
        } else {
            self.layout.prefix_heights[idx - 1]
        };
        let item_bottom = self.layout.prefix_heights[idx];
        let offset_y = self.scroll_state.offset().y;

        if item_top < offset_y || item_bottom - item_top > self.viewport_height {
            // Above the viewport, or too tall to fit: show its top
            self.scroll_state
                .set_offset(Position { x: 0, y: item_top });
            self.stick_to_bottom = false;
        } else if item_bottom > offset_y + self.viewport_height {
            // Below the viewport: scroll down to show its bottom
            let new_y = item_bottom.saturating_sub(self.viewport_height);
            self.scroll_state
                .set_offset(Position { x: 0, y: new_y });
            // Re-pin if we've landed at the absolute bottom
            self.stick_to_bottom = new_y >= self.max_scroll();
        }
    }

    /// Clamp scroll and re-engage auto-scroll if the user has reached the bottom.
    /// Called on scroll-down events so that scrolling past the end re-pins to bottom.
    pub fn repin_if_at_bottom(&mut self) {
        let max_y = self.max_scroll();
        let current = self.scroll_state.offset();
        if current.y >= max_y {
            self.stick_to_bottom = true;
            self.scroll_state.set_offset(Position {
                x: current.x,
                y: max_y,
            });
        }
    }

    /// Jump to the newest content and follow it again.
    pub fn scroll_to_bottom(&mut self) {
        self.stick_to_bottom = true;
        self.scroll_state.scroll_to_bottom();
    }

    /// Content exists below the viewport (as of the last render).
    pub fn has_unseen_content(&self) -> bool {
        !self.stick_to_bottom && self.scroll_state.offset().y < self.max_scroll()
    }

    fn max_scroll(&self) -> u16 {
        self.layout
            .total_height()
            .saturating_sub(self.viewport_height)
    }
}

/// Scrollable transcript view component.
/// Created fresh each frame with references to state and data.
pub struct MessageList<'a> {
    // Mutable reference to persistent state
    pub state: &'a mut MessageListState,
    pub transcript: &'a Transcript,
    pub pulse_value: f32,
    pub spinner_frame: usize,
}

impl<'a> MessageList<'a> {
    pub fn new(
        state: &'a mut MessageListState,
        transcript: &'a Transcript,
        pulse_value: f32,
        spinner_frame: usize,
    ) -> Self {
        Self {
            state,
            transcript,
            pulse_value,
            spinner_frame,
        }
    }

    fn view(&self, index: usize, record: &'a MessageRecord) -> MessageView<'a> {
        let pending = self.transcript.pending().map(|id| id.0) == Some(index);
        MessageView {
            record,
            status_expanded: self.state.effective_expanded(index, record),
            is_hovered: self.state.hovered_index == Some(index),
            is_selected: self.state.selected_index == Some(index),
            pulse_intensity: if pending { self.pulse_value } else { 0.0 },
            spinner_frame: self.spinner_frame,
        }
    }
}

impl<'a> Component for MessageList<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let content_width = area.width.saturating_sub(1); // -1 for scrollbar safe area
        let records = self.transcript.records();
        let pending = self.transcript.pending().map(|id| id.0);

        // 1. Update Layout Cache (Internal Mutation)
        let reusable = self.state.layout.reusable_count(
            records.len(),
            content_width,
            pending,
            &self.state.expanded_overrides,
        );
        let keep = reusable.min(self.state.layout.heights.len());
        self.state.layout.heights.truncate(keep);

        let measured: Vec<u16> = records
            .iter()
            .enumerate()
            .skip(keep)
            .map(|(i, record)| self.view(i, record).calculate_height(content_width))
            .collect();
        let layout = &mut self.state.layout;
        layout.heights.extend(measured);
        layout.rebuild_prefix_heights();
        layout.update_metadata(
            records.len(),
            content_width,
            pending,
            &self.state.expanded_overrides,
        );

        let total_height = layout.total_height();

        // 2. Clamp scroll offset to prevent overscrolling past content.
        self.state.viewport_height = area.height;
        if !self.state.stick_to_bottom {
            self.state.clamp_scroll();
        }

        let scroll_offset = self.state.scroll_state.offset().y;
        let visible_range = self.state.layout.visible_range(scroll_offset, area.height);

        // 3. Render visible records into a ScrollView
        let mut scroll_view = ScrollView::new(Size::new(content_width, total_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Always)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let mut y_offset: u16 = if visible_range.start > 0 {
            self.state.layout.prefix_heights[visible_range.start - 1]
        } else {
            0
        };

        for i in visible_range {
            let height = self.state.layout.heights[i];
            let segment_rect = Rect::new(0, y_offset, content_width, height);
            scroll_view.render_widget(self.view(i, &records[i]), segment_rect);
            y_offset += height;
        }

        // Auto-scroll logic (Mutation)
        if self.state.stick_to_bottom {
            self.state.scroll_state.scroll_to_bottom();
        }

        // Render the ScrollView into the full viewport area
        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);
    }
}

/// EventHandler is implemented on `MessageListState` rather than `MessageList` because:
/// 1. Event handling requires persistent state (scroll position, stick_to_bottom flag)
/// 2. `MessageList` is recreated each frame with fresh props, so it can't hold state
/// 3. The state object lives in `TuiState` and persists across the event loop
impl EventHandler for MessageListState {
    type Event = (); // Scrolling is handled internally

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollToBottom => self.scroll_to_bottom(),
            // Mouse moves handled by parent due to hit testing
            _ => {}
        }
        None
    }
}

/// Cached layout measurements
pub struct LayoutCache {
    pub heights: Vec<u16>,
    pub prefix_heights: Vec<u16>,
    record_count: usize,
    content_width: u16,
    /// Pending record at the time heights were measured.
    cached_pending: Option<usize>,
    /// Overrides at the time heights were measured.
    cached_overrides: HashMap<usize, bool>,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutCache {
    pub fn new() -> Self {
        Self {
            heights: Vec::new(),
            prefix_heights: Vec::new(),
            record_count: 0,
            content_width: 0,
            cached_pending: None,
            cached_overrides: HashMap::new(),
        }
    }

    /// How many leading cached heights are still valid.
    pub fn reusable_count(
        &self,
        record_count: usize,
        content_width: u16,
        pending: Option<usize>,
        overrides: &HashMap<usize, bool>,
    ) -> usize {
        if self.content_width != content_width || self.heights.is_empty() {
            return 0;
        }

        // Fewer records than cached: the transcript was replaced
        if record_count < self.record_count {
            return 0;
        }

        let mut reusable = record_count;

        // A toggled panel changes that record's height
        if overrides != &self.cached_overrides
            && let Some(earliest) = overrides
                .iter()
                .filter(|(i, open)| self.cached_overrides.get(i) != Some(open))
                .map(|(i, _)| *i)
                .chain(
                    self.cached_overrides
                        .keys()
                        .filter(|i| !overrides.contains_key(i))
                        .copied(),
                )
                .min()
        {
            reusable = reusable.min(earliest);
        }

        // The in-flight record grows with every stage event, and the record
        // that was in flight last frame may have finalized since.
        for volatile in [self.cached_pending, pending].into_iter().flatten() {
            reusable = reusable.min(volatile);
        }

        reusable
    }

    pub fn update_metadata(
        &mut self,
        record_count: usize,
        content_width: u16,
        pending: Option<usize>,
        overrides: &HashMap<usize, bool>,
    ) {
        self.record_count = record_count;
        self.content_width = content_width;
        self.cached_pending = pending;
        self.cached_overrides = overrides.clone();
    }

    pub fn rebuild_prefix_heights(&mut self) {
        self.prefix_heights = self
            .heights
            .iter()
            .scan(0u16, |acc, &h| {
                *acc = acc.saturating_add(h);
                Some(*acc)
            })
            .collect();
    }

    pub fn total_height(&self) -> u16 {
        self.prefix_heights.last().copied().unwrap_or(0)
    }

    pub fn visible_range(
        &self,
        scroll_offset: u16,
        viewport_height: u16,
    ) -> std::ops::Range<usize> {
        let buffer = viewport_height / 2;
        let buffered_start = scroll_offset.saturating_sub(buffer);
        let buffered_end = scroll_offset
            .saturating_add(viewport_height)
            .saturating_add(buffer);

        let start = self
            .prefix_heights
            .partition_point(|&end| end <= buffered_start);
        let end = self
            .prefix_heights
            .partition_point(|&end| end < buffered_end)
            .saturating_add(1)
            .min(self.prefix_heights.len());

        start..end
    }
}
