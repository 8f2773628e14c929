//! Live wall slideshow state machine.
//!
//! [`SlideshowState`] is a pure reducer. It keeps two slices apart:
//!
//! - `source_of_truth`: the approved uploads as last fetched from the store
//! - `display_queue`: the order the wall is actually playing
//!
//! A refresh never disturbs the item on screen. New uploads are spliced in
//! right after the current position so they play next, and the newest-first
//! mode only re-sorts once a full round has been shown.
//!
//! Two display slots alternate for crossfading. The visible slot always holds
//! `display_queue[current_index]` and the hidden slot holds the item after it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use photowall_db::entities::{event::OrderingMode, upload};
use serde::Serialize;

/// One item on the wall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: String,
    pub url: String,
    pub mime_type: String,
    pub uploader_name: Option<String>,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&upload::Model> for Slide {
    fn from(model: &upload::Model) -> Self {
        Self {
            id: model.id.clone(),
            url: model.url.clone(),
            mime_type: model.mime_type.clone(),
            uploader_name: model.uploader_name.clone(),
            caption: model.caption.clone(),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// One of the two alternating display slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotId {
    A,
    B,
}

/// Input to the reducer.
#[derive(Debug, Clone)]
pub enum SlideshowCommand {
    /// Replace everything with a fresh fetch.
    Load(Vec<Slide>),
    /// Reconcile a refetch after change notifications.
    Refresh(Vec<Slide>),
    /// Display timer tick.
    Advance,
    /// Delayed re-sort after a completed round in newest-first mode.
    ReorderRound,
    /// Organizer switched the ordering mode.
    SetOrderingMode(OrderingMode),
}

/// Follow-up the driver has to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Pause the advance timer and send [`SlideshowCommand::ReorderRound`]
    /// after the reorder delay.
    ScheduleReorder,
}

/// Snapshot handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideshowFrame {
    pub slot_a: Option<Slide>,
    pub slot_b: Option<Slide>,
    pub visible_slot: SlotId,
    pub current_index: usize,
    pub queue_length: usize,
    pub ordering_mode: OrderingMode,
    /// Nothing approved yet, show the waiting screen.
    pub idle: bool,
}

/// Slideshow reconciliation state.
#[derive(Debug, Clone)]
pub struct SlideshowState {
    source_of_truth: Vec<Slide>,
    display_queue: Vec<Slide>,
    current_index: usize,
    showing_slot_a: bool,
    slot_a: Option<Slide>,
    slot_b: Option<Slide>,
    ordering_mode: OrderingMode,
    has_completed_round: bool,
}

impl SlideshowState {
    /// Empty state in the given ordering mode.
    #[must_use]
    pub const fn new(ordering_mode: OrderingMode) -> Self {
        Self {
            source_of_truth: Vec::new(),
            display_queue: Vec::new(),
            current_index: 0,
            showing_slot_a: true,
            slot_a: None,
            slot_b: None,
            ordering_mode,
            has_completed_round: false,
        }
    }

    /// Apply one command.
    pub fn apply(&mut self, command: SlideshowCommand) -> Effect {
        match command {
            SlideshowCommand::Load(slides) => {
                self.load(slides);
                Effect::None
            }
            SlideshowCommand::Refresh(slides) => {
                self.refresh(slides);
                Effect::None
            }
            SlideshowCommand::Advance => self.advance(),
            SlideshowCommand::ReorderRound => {
                self.reorder_round();
                Effect::None
            }
            SlideshowCommand::SetOrderingMode(mode) => {
                self.set_ordering_mode(mode);
                Effect::None
            }
        }
    }

    /// Replace all state with a fresh fetch, newest first.
    pub fn load(&mut self, mut slides: Vec<Slide>) {
        sort_newest_first(&mut slides);
        self.source_of_truth.clone_from(&slides);
        self.display_queue = slides;
        self.current_index = 0;
        self.showing_slot_a = true;
        self.has_completed_round = false;
        self.slot_a = self.display_queue.first().cloned();
        self.slot_b = self
            .display_queue
            .get(1)
            .or_else(|| self.display_queue.first())
            .cloned();
    }

    /// Reconcile a refetched approved-upload list with the playing queue.
    ///
    /// Removed items leave the queue, edited items are updated in place and
    /// items not seen before are inserted after the current position in
    /// ascending creation order. The current item keeps playing; if it was
    /// removed the index is clamped into range.
    pub fn refresh(&mut self, fetched: Vec<Slide>) {
        let known: HashSet<&str> = self.source_of_truth.iter().map(|s| s.id.as_str()).collect();
        let mut new_items: Vec<Slide> = fetched
            .iter()
            .filter(|s| !known.contains(s.id.as_str()))
            .cloned()
            .collect();

        let current_id = self.display_queue.get(self.current_index).map(|s| s.id.clone());

        // Edits and removals, keeping the playing order
        let queue: Vec<Slide> = self
            .display_queue
            .iter()
            .filter_map(|s| fetched.iter().find(|f| f.id == s.id).cloned())
            .collect();
        self.display_queue = queue;

        // Known items missing from the queue cannot be placed, treat as new
        let queued: HashSet<String> = self.display_queue.iter().map(|s| s.id.clone()).collect();
        for slide in &fetched {
            if known.contains(slide.id.as_str())
                && !queued.contains(&slide.id)
                && !new_items.iter().any(|n| n.id == slide.id)
            {
                new_items.push(slide.clone());
            }
        }

        self.current_index = current_id
            .and_then(|id| self.display_queue.iter().position(|s| s.id == id))
            .unwrap_or_else(|| self.clamped_index());

        if !new_items.is_empty() {
            new_items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            let at = (self.current_index + 1).min(self.display_queue.len());
            let tail = self.display_queue.split_off(at);
            self.display_queue.extend(new_items);
            self.display_queue.extend(tail);
            self.has_completed_round = false;
        }

        self.source_of_truth = fetched;
        self.sync_slots();
    }

    /// Move to the next item. No-op with fewer than two items.
    pub fn advance(&mut self) -> Effect {
        let len = self.display_queue.len();
        if len < 2 {
            return Effect::None;
        }

        let was_last = self.current_index + 1 >= len;
        self.current_index = (self.current_index + 1) % len;
        self.showing_slot_a = !self.showing_slot_a;
        self.sync_slots();

        if was_last {
            self.has_completed_round = true;
            if self.ordering_mode == OrderingMode::NewestFirst {
                return Effect::ScheduleReorder;
            }
        }
        Effect::None
    }

    /// Re-sort the queue newest first after a completed round.
    ///
    /// Only acts in newest-first mode with the round flag set; a refresh with
    /// new items or a mode change in the meantime cancels it.
    pub fn reorder_round(&mut self) {
        if self.ordering_mode != OrderingMode::NewestFirst || !self.has_completed_round {
            return;
        }
        sort_newest_first(&mut self.display_queue);
        self.current_index = 0;
        self.has_completed_round = false;
        self.sync_slots();
    }

    /// Switch ordering mode. The next completed round decides on reordering.
    pub fn set_ordering_mode(&mut self, mode: OrderingMode) {
        self.ordering_mode = mode;
        self.has_completed_round = false;
    }

    fn clamped_index(&self) -> usize {
        self.current_index
            .min(self.display_queue.len().saturating_sub(1))
    }

    /// Restore the slot invariant. The hidden slot is only rewritten when it
    /// does not already hold the next item.
    fn sync_slots(&mut self) {
        let len = self.display_queue.len();
        let current = self.display_queue.get(self.current_index).cloned();
        let next = if len == 0 {
            None
        } else {
            self.display_queue.get((self.current_index + 1) % len).cloned()
        };

        let (visible, hidden) = if self.showing_slot_a {
            (&mut self.slot_a, &mut self.slot_b)
        } else {
            (&mut self.slot_b, &mut self.slot_a)
        };

        if *visible != current {
            *visible = current;
        }
        if next.is_some() && *hidden != next {
            *hidden = next;
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn frame(&self) -> SlideshowFrame {
        SlideshowFrame {
            slot_a: self.slot_a.clone(),
            slot_b: self.slot_b.clone(),
            visible_slot: if self.showing_slot_a { SlotId::A } else { SlotId::B },
            current_index: self.current_index,
            queue_length: self.display_queue.len(),
            ordering_mode: self.ordering_mode,
            idle: self.display_queue.is_empty(),
        }
    }

    #[must_use]
    pub fn display_queue(&self) -> &[Slide] {
        &self.display_queue
    }

    #[must_use]
    pub fn source_of_truth(&self) -> &[Slide] {
        &self.source_of_truth
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub const fn showing_slot_a(&self) -> bool {
        self.showing_slot_a
    }

    #[must_use]
    pub const fn has_completed_round(&self) -> bool {
        self.has_completed_round
    }

    #[must_use]
    pub const fn ordering_mode(&self) -> OrderingMode {
        self.ordering_mode
    }

    /// The item on screen.
    #[must_use]
    pub fn current(&self) -> Option<&Slide> {
        self.display_queue.get(self.current_index)
    }

    /// Whether the advance timer should run.
    #[must_use]
    pub fn should_advance(&self) -> bool {
        self.display_queue.len() >= 2
    }
}

fn sort_newest_first(slides: &mut [Slide]) {
    slides.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}
