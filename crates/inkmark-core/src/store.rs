//! Annotation store with snapshot-based undo/redo
//!
//! Every mutation first pushes a deep copy of the whole collection onto the
//! undo stack and clears the redo stack. Both stacks are bounded; the oldest
//! snapshot is evicted on overflow.
//!
//! Moves are two-phase: `begin_move` captures the pre-drag snapshot once,
//! `update_move` mutates in place, `end_move` finishes the drag. The
//! captured snapshot is pushed on the first update that actually changes the
//! position, so a click without movement leaves history untouched.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use crate::annotation::{Annotation, AnnotationId};
use crate::error::EditorError;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

type Snapshot = Vec<Annotation>;

#[derive(Debug, Clone)]
struct PendingMove {
    id: AnnotationId,
    before: Snapshot,
    recorded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationStore {
    next_id: AnnotationId,
    annotations: Vec<Annotation>,
    #[serde(skip)]
    undo_stack: VecDeque<Snapshot>,
    #[serde(skip)]
    redo_stack: VecDeque<Snapshot>,
    #[serde(skip)]
    capacity: usize,
    #[serde(skip)]
    pending_move: Option<PendingMove>,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose undo and redo stacks each hold at most `capacity` snapshots
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_id: 1,
            annotations: Vec::new(),
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            capacity: capacity.max(1),
            pending_move: None,
        }
    }

    /// Append an annotation, assigning it a fresh id
    pub fn add(&mut self, mut annotation: Annotation) -> AnnotationId {
        self.record();

        let id = self.next_id;
        self.next_id += 1;
        annotation.set_id(id);

        debug!(id, page = annotation.page(), "annotation added");
        self.annotations.push(annotation);
        id
    }

    /// Remove an annotation. Unknown ids are a no-op and leave history untouched.
    pub fn delete(&mut self, id: AnnotationId) -> bool {
        let Some(pos) = self.index_of(id) else {
            return false;
        };
        self.record();
        self.annotations.remove(pos);
        debug!(id, "annotation deleted");
        true
    }

    /// Start dragging an annotation; captures the pre-drag snapshot
    pub fn begin_move(&mut self, id: AnnotationId) -> bool {
        if self.index_of(id).is_none() {
            return false;
        }
        self.pending_move = Some(PendingMove {
            id,
            before: self.annotations.clone(),
            recorded: false,
        });
        true
    }

    /// Reposition an annotation without taking a snapshot
    pub fn update_move(&mut self, id: AnnotationId, x: f64, y: f64) -> bool {
        if !(x.is_finite() && y.is_finite()) {
            return false;
        }
        let Some(pos) = self.index_of(id) else {
            return false;
        };

        let current = self.annotations[pos].position();
        if current.x == x && current.y == y {
            return true;
        }

        if let Some(pending) = self.pending_move.as_mut() {
            if pending.id == id && !pending.recorded {
                pending.recorded = true;
                let before = std::mem::take(&mut pending.before);
                self.push_undo(before);
                self.redo_stack.clear();
            }
        }

        self.annotations[pos].set_position(x, y);
        true
    }

    /// Finish a drag. Returns true if the drag changed the annotation's position.
    pub fn end_move(&mut self, id: AnnotationId) -> bool {
        match self.pending_move.take() {
            Some(pending) if pending.id == id => {
                if pending.recorded {
                    debug!(id, "annotation moved");
                }
                pending.recorded
            }
            other => {
                self.pending_move = other;
                false
            }
        }
    }

    /// Single programmatic move. Returns true if the position changed.
    pub fn move_to(&mut self, id: AnnotationId, x: f64, y: f64) -> bool {
        if !self.begin_move(id) {
            return false;
        }
        self.update_move(id, x, y);
        self.end_move(id)
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop_back() else {
            return false;
        };
        self.pending_move = None;
        let current = std::mem::replace(&mut self.annotations, previous);
        push_bounded(&mut self.redo_stack, current, self.capacity);
        debug!(undo = self.undo_stack.len(), redo = self.redo_stack.len(), "undo");
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop_back() else {
            return false;
        };
        self.pending_move = None;
        let current = std::mem::replace(&mut self.annotations, next);
        push_bounded(&mut self.undo_stack, current, self.capacity);
        debug!(undo = self.undo_stack.len(), redo = self.redo_stack.len(), "redo");
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop every annotation and all history (new document loaded)
    pub fn clear(&mut self) {
        self.annotations.clear();
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.pending_move = None;
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id() == id)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotations on `page` in insertion order. The iterator is lazy and can be cloned to restart.
    pub fn for_page(&self, page: u32) -> impl Iterator<Item = &Annotation> + Clone + '_ {
        self.annotations.iter().filter(move |a| a.page() == page)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Annotations in insertion order as a JSON array
    pub fn to_json(&self) -> Result<String, EditorError> {
        Ok(serde_json::to_string(&self.annotations)?)
    }

    fn index_of(&self, id: AnnotationId) -> Option<usize> {
        self.annotations.iter().position(|a| a.id() == id)
    }

    fn record(&mut self) {
        self.pending_move = None;
        let snapshot = self.annotations.clone();
        self.push_undo(snapshot);
        self.redo_stack.clear();
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        push_bounded(&mut self.undo_stack, snapshot, self.capacity);
    }
}

fn push_bounded(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, capacity: usize) {
    while stack.len() >= capacity {
        stack.pop_front();
    }
    stack.push_back(snapshot);
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::annotation::TextStyle;
    use crate::coords::CanvasPoint;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Add(u32),
        Delete(usize),
        Move(usize, f64, f64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..4).prop_map(Op::Add),
            (0usize..8).prop_map(Op::Delete),
            (0usize..8, 0.0f64..900.0, 0.0f64..1200.0).prop_map(|(i, x, y)| Op::Move(i, x, y)),
        ]
    }

    fn apply(store: &mut AnnotationStore, op: &Op) -> bool {
        match op {
            Op::Add(page) => {
                let ann = Annotation::text(
                    *page,
                    CanvasPoint::new(1.0, 1.0),
                    "x",
                    TextStyle::default(),
                )
                .unwrap();
                store.add(ann);
                true
            }
            Op::Delete(i) => match store.annotations().get(*i).map(|a| a.id()) {
                Some(id) => store.delete(id),
                None => false,
            },
            Op::Move(i, x, y) => match store.annotations().get(*i).map(|a| a.id()) {
                Some(id) => store.move_to(id, *x, *y),
                None => false,
            },
        }
    }

    proptest! {
        /// Undo walks back through every recorded state; redo replays them exactly
        #[test]
        fn undo_redo_are_inverses(ops in proptest::collection::vec(op(), 1..30)) {
            let mut store = AnnotationStore::new();
            let mut states = vec![store.annotations().to_vec()];

            for op in &ops {
                if apply(&mut store, op) {
                    states.push(store.annotations().to_vec());
                }
            }
            let final_state = store.annotations().to_vec();

            for expected in states.iter().rev().skip(1) {
                prop_assert!(store.undo());
                prop_assert_eq!(store.annotations(), expected.as_slice());
            }
            prop_assert!(!store.undo());

            for expected in states.iter().skip(1) {
                prop_assert!(store.redo());
                prop_assert_eq!(store.annotations(), expected.as_slice());
            }
            prop_assert!(!store.redo());
            prop_assert_eq!(store.annotations(), final_state.as_slice());
        }
    }
}
