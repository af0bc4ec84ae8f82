// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Texture atlas allocator.

The atlas is one square RGBA texture of `2^size_magnitude` texels per side, carved
up by a quadtree.  Every quadrant of a node is either empty, subdivided into four
smaller quadrants, or occupied by a single [reservation](reservation).

Space is never freed eagerly.  When nothing fits, the least recently drawn
quadrant that is at least as large as the request is evicted wholesale, including
everything nested below it.  A request wider than a root quadrant takes the whole
texture, evicting the entire tree.  A quadrant drawn during the current tick is never a
victim, so a frame cannot evict its own sprites.

Nodes live in an arena indexed by [NodeId]; subdividing allocates from the free
list and evicting a subdivided quadrant returns its nodes to it.
*/

pub mod reservation;

pub use reservation::{AtlasPatch, AtlasSink, ReserveError, SourceRegion};

use crate::bittricks::ceil_log2;
use crate::interpolation::Tick;

/// Default atlas side is `1 << 11 == 2048` texels.
pub const DEFAULT_SIZE_MAGNITUDE: u32 = 11;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum AtlasError {
    #[error("cannot allocate an empty {width}x{height} region")]
    EmptyRequest { width: u32, height: u32 },
    #[error("{width}x{height} does not fit in a {size}px atlas")]
    RequestTooLarge { width: u32, height: u32, size: u32 },
    #[error("no candidate found after splitting a larger quadrant")]
    NoCandidateAfterSplit,
    #[error("unknown reservation {0:?}")]
    UnknownReservation(ReservationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservationId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(u32);

const ROOT: NodeId = NodeId(0);
/// Stands in for the parent of [ROOT]; its only slot spans the whole atlas.
const WHOLE: NodeId = NodeId(u32::MAX);
const WHOLE_SLOT: SlotRef = SlotRef {
    node: WHOLE,
    index: 0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    Node(NodeId),
    Reservation(ReservationId),
}

#[derive(Debug)]
struct Node {
    children: [Slot; 4],
}

impl Node {
    fn empty() -> Self {
        Node {
            children: [Slot::Empty; 4],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotRef {
    node: NodeId,
    index: usize,
}

/// Where a reservation currently lives in the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    /// The quadrant is `1 << level` texels per side.
    pub level: u32,
    slot: SlotRef,
}

#[derive(Debug)]
struct Reservation {
    placement: Option<Placement>,
    last_drawn: Tick,
}

#[derive(Debug)]
struct Candidate {
    slot: SlotRef,
    x: u32,
    y: u32,
    level: u32,
    age: Tick,
    empty: bool,
}

struct Search {
    target: u32,
    candidate: Option<Candidate>,
    /// An empty quadrant of exactly the target size was found.
    done: bool,
}

impl Search {
    fn new(target: u32) -> Self {
        Search {
            target,
            candidate: None,
            done: false,
        }
    }
    fn best_age(&self) -> Tick {
        self.candidate.as_ref().map_or(Tick::MAX, |c| c.age)
    }
}

#[derive(Debug)]
pub struct Atlas {
    size_magnitude: u32,
    nodes: Vec<Node>,
    free_nodes: Vec<NodeId>,
    reservations: Vec<Reservation>,
    free_reservations: Vec<ReservationId>,
    keys: reservation::ReservationKeys,
    /// Occupant of the whole texture.  The tree is empty while this is set.
    whole: Option<ReservationId>,
    count: usize,
}

impl Atlas {
    pub fn new(size_magnitude: u32) -> Self {
        assert!(
            (1..=15).contains(&size_magnitude),
            "atlas magnitude {size_magnitude} out of range"
        );
        Atlas {
            size_magnitude,
            nodes: vec![Node::empty()],
            free_nodes: Vec::new(),
            reservations: Vec::new(),
            free_reservations: Vec::new(),
            keys: Default::default(),
            whole: None,
            count: 0,
        }
    }

    pub fn size_magnitude(&self) -> u32 {
        self.size_magnitude
    }

    /// Side length in texels.
    pub fn size(&self) -> u32 {
        1 << self.size_magnitude
    }

    /// Number of reservations currently placed.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of arena nodes in use, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    pub fn placement(&self, id: ReservationId) -> Option<Placement> {
        self.reservations.get(id.0 as usize).and_then(|r| r.placement)
    }

    pub fn is_allocated(&self, id: ReservationId) -> bool {
        self.placement(id).is_some()
    }

    pub fn last_drawn(&self, id: ReservationId) -> Option<Tick> {
        self.reservations.get(id.0 as usize).map(|r| r.last_drawn)
    }

    /// Creates a reservation that is not yet placed.
    pub fn create_reservation(&mut self) -> ReservationId {
        let fresh = Reservation {
            placement: None,
            last_drawn: 0,
        };
        if let Some(id) = self.free_reservations.pop() {
            self.reservations[id.0 as usize] = fresh;
            id
        } else {
            self.reservations.push(fresh);
            ReservationId(self.reservations.len() as u32 - 1)
        }
    }

    fn reservation_mut(&mut self, id: ReservationId) -> Result<&mut Reservation, AtlasError> {
        self.reservations
            .get_mut(id.0 as usize)
            .ok_or(AtlasError::UnknownReservation(id))
    }

    fn alloc_node(&mut self) -> NodeId {
        if let Some(id) = self.free_nodes.pop() {
            self.nodes[id.0 as usize] = Node::empty();
            id
        } else {
            self.nodes.push(Node::empty());
            NodeId(self.nodes.len() as u32 - 1)
        }
    }

    fn slot(&self, slot: SlotRef) -> Slot {
        if slot.node == WHOLE {
            return self.whole.map_or(Slot::Empty, Slot::Reservation);
        }
        self.nodes[slot.node.0 as usize].children[slot.index]
    }

    fn set_slot(&mut self, slot: SlotRef, value: Slot) {
        if slot.node == WHOLE {
            self.whole = match value {
                Slot::Reservation(id) => Some(id),
                _ => None,
            };
            return;
        }
        self.nodes[slot.node.0 as usize].children[slot.index] = value;
    }

    /// Finds space for `id` that fits `width` x `height`, evicting the least recently
    /// drawn quadrant if nothing is free.
    ///
    /// Returns `Ok(false)` when the only candidate was drawn during `tick`.
    /// Requests up to the full atlas side are accepted; anything larger is an error.
    pub fn allocate(
        &mut self,
        id: ReservationId,
        width: u32,
        height: u32,
        tick: Tick,
    ) -> Result<bool, AtlasError> {
        if width == 0 || height == 0 {
            return Err(AtlasError::EmptyRequest { width, height });
        }
        let target = ceil_log2(width.max(height));
        if target > self.size_magnitude {
            return Err(AtlasError::RequestTooLarge {
                width,
                height,
                size: self.size(),
            });
        }
        self.reservation_mut(id)?;
        if target == self.size_magnitude {
            return Ok(self.allocate_whole(id, width, height, tick));
        }
        if let Some(whole) = self.whole {
            if self.reservations[whole.0 as usize].last_drawn >= tick {
                return Ok(false);
            }
            self.evict_slot(WHOLE_SLOT, tick);
        }

        let mut search = Search::new(target);
        self.traverse(ROOT, self.size_magnitude - 1, 0, 0, &mut search);
        let Some(mut candidate) = search.candidate else {
            return Ok(false);
        };
        if !candidate.empty && candidate.age >= tick {
            return Ok(false);
        }

        if candidate.level != target {
            //coarser than needed: clear it, then split it down to size
            self.evict_slot(candidate.slot, tick);
            let mut search = Search::new(target);
            self.traverse(ROOT, self.size_magnitude - 1, 0, 0, &mut search);
            candidate = match search.candidate {
                Some(c) if search.done => c,
                _ => return Err(AtlasError::NoCandidateAfterSplit),
            };
        }

        self.evict_slot(candidate.slot, tick);
        self.set_slot(candidate.slot, Slot::Reservation(id));
        let placement = Placement {
            x: candidate.x,
            y: candidate.y,
            level: candidate.level,
            slot: candidate.slot,
        };
        self.reservation_mut(id)?.placement = Some(placement);
        self.place(placement, width, height);
        Ok(true)
    }

    fn place(&mut self, placement: Placement, width: u32, height: u32) {
        self.count += 1;
        logwise::trace_sync!(
            "Allocated {w}x{h} at ({x}, {y}), atlas count {count}",
            w = width,
            h = height,
            x = placement.x,
            y = placement.y,
            count = self.count
        );
    }

    /// Places `id` over the entire texture, clearing everything else.
    fn allocate_whole(&mut self, id: ReservationId, width: u32, height: u32, tick: Tick) -> bool {
        if self.count > 0 {
            let newest = match self.whole {
                Some(whole) => self.reservations[whole.0 as usize].last_drawn,
                None => self.newest(ROOT),
            };
            if newest >= tick {
                return false;
            }
        }
        self.evict_slot(WHOLE_SLOT, tick);
        for index in 0..4 {
            self.evict_slot(SlotRef { node: ROOT, index }, tick);
        }
        self.set_slot(WHOLE_SLOT, Slot::Reservation(id));
        let placement = Placement {
            x: 0,
            y: 0,
            level: self.size_magnitude,
            slot: WHOLE_SLOT,
        };
        self.reservations[id.0 as usize].placement = Some(placement);
        self.place(placement, width, height);
        true
    }

    /// Most recent draw tick of any reservation below `node`.
    fn newest(&self, node: NodeId) -> Tick {
        self.nodes[node.0 as usize]
            .children
            .iter()
            .map(|child| match *child {
                Slot::Empty => 0,
                Slot::Node(n) => self.newest(n),
                Slot::Reservation(r) => self.reservations[r.0 as usize].last_drawn,
            })
            .max()
            .unwrap_or(0)
    }

    /// Returns the most recent draw tick in `node`'s subtree.
    fn traverse(&mut self, node: NodeId, level: u32, x: u32, y: u32, search: &mut Search) -> Tick {
        let mut newest: Tick = 0;
        for index in 0..4 {
            let child_x = x + (((index & 1) as u32) << level);
            let child_y = y + (((index >> 1) as u32) << level);
            let slot = self.nodes[node.0 as usize].children[index];
            let (age, empty) = match slot {
                Slot::Node(child) => {
                    debug_assert!(level > 0);
                    (self.traverse(child, level - 1, child_x, child_y, search), false)
                }
                Slot::Reservation(r) => (self.reservations[r.0 as usize].last_drawn, false),
                Slot::Empty if level > search.target => {
                    let child = self.alloc_node();
                    self.nodes[node.0 as usize].children[index] = Slot::Node(child);
                    (self.traverse(child, level - 1, child_x, child_y, search), false)
                }
                Slot::Empty => (0, true),
            };
            if search.done {
                return age;
            }
            if level >= search.target && (empty || age < search.best_age()) {
                search.candidate = Some(Candidate {
                    slot: SlotRef { node, index },
                    x: child_x,
                    y: child_y,
                    level,
                    age,
                    empty,
                });
                if empty {
                    search.done = true;
                    return 0;
                }
            }
            newest = newest.max(age);
        }
        newest
    }

    /// Empties `slot`, unplacing every reservation below it.
    fn evict_slot(&mut self, slot: SlotRef, tick: Tick) {
        let occupant = self.slot(slot);
        self.set_slot(slot, Slot::Empty);
        self.evict(occupant, tick);
    }

    fn evict(&mut self, occupant: Slot, tick: Tick) {
        match occupant {
            Slot::Empty => {}
            Slot::Node(node) => {
                let children = self.nodes[node.0 as usize].children;
                for child in children {
                    self.evict(child, tick);
                }
                self.free_nodes.push(node);
            }
            Slot::Reservation(id) => {
                let reservation = &mut self.reservations[id.0 as usize];
                if let Some(placement) = reservation.placement.take() {
                    self.count -= 1;
                    logwise::trace_sync!(
                        "Deallocated at ({x}, {y}) last drawn {age} ticks ago, atlas count {count}",
                        x = placement.x,
                        y = placement.y,
                        age = tick.saturating_sub(reservation.last_drawn),
                        count = self.count
                    );
                }
            }
        }
    }

    /// Frees the space held by `id`, if any.  The reservation remains usable.
    pub fn release(&mut self, id: ReservationId, tick: Tick) -> Result<(), AtlasError> {
        let placement = self.reservation_mut(id)?.placement;
        if let Some(placement) = placement {
            self.evict_slot(placement.slot, tick);
        }
        Ok(())
    }

    /// Releases `id` and makes its handle available for reuse.
    fn destroy_reservation(&mut self, id: ReservationId, tick: Tick) {
        if self.release(id, tick).is_ok() {
            self.free_reservations.push(id);
        }
    }

    /// Walks every placement, checking the tree and the counter agree.
    #[cfg(test)]
    fn placements(&self) -> Vec<(ReservationId, Placement)> {
        let mut out = Vec::new();
        if let Some(whole) = self.whole {
            assert!(self.nodes[ROOT.0 as usize].children.iter().all(|c| *c == Slot::Empty));
            out.push((whole, self.reservations[whole.0 as usize].placement.expect("whole atlas unplaced")));
        }
        let mut stack = vec![ROOT];
        while let Some(node) = stack.pop() {
            for (index, child) in self.nodes[node.0 as usize].children.iter().enumerate() {
                match *child {
                    Slot::Node(n) => stack.push(n),
                    Slot::Reservation(r) => {
                        let placement = self.reservations[r.0 as usize]
                            .placement
                            .expect("tree holds an unplaced reservation");
                        assert_eq!(placement.slot, SlotRef { node, index });
                        out.push((r, placement));
                    }
                    Slot::Empty => {}
                }
            }
        }
        assert_eq!(out.len(), self.count);
        out
    }
}

impl Default for Atlas {
    fn default() -> Self {
        Atlas::new(DEFAULT_SIZE_MAGNITUDE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: &Placement, b: &Placement) -> bool {
        let (asz, bsz) = (1u32 << a.level, 1u32 << b.level);
        a.x < b.x + bsz && b.x < a.x + asz && a.y < b.y + bsz && b.y < a.y + asz
    }

    #[test]
    fn first_allocation_lands_at_origin() {
        let mut atlas = Atlas::new(4);
        let id = atlas.create_reservation();
        assert_eq!(atlas.allocate(id, 3, 2, 1), Ok(true));
        let p = atlas.placement(id).unwrap();
        assert_eq!((p.x, p.y, p.level), (0, 0, 2));
        assert_eq!(atlas.count(), 1);
    }

    #[test]
    fn placements_are_aligned_and_disjoint() {
        let mut atlas = Atlas::new(6);
        let sizes = [(5, 5), (1, 1), (16, 3), (2, 9), (32, 32), (4, 4), (7, 1), (8, 8)];
        let mut ids = Vec::new();
        for (w, h) in sizes {
            let id = atlas.create_reservation();
            assert_eq!(atlas.allocate(id, w, h, 10), Ok(true), "{w}x{h}");
            ids.push((id, w, h));
        }
        let placements = atlas.placements();
        assert_eq!(placements.len(), sizes.len());
        for (id, w, h) in &ids {
            let p = atlas.placement(*id).unwrap();
            let side = 1u32 << p.level;
            assert!(side >= *w && side >= *h);
            assert_eq!(p.x % side, 0);
            assert_eq!(p.y % side, 0);
            assert!(p.x + side <= atlas.size() && p.y + side <= atlas.size());
        }
        for (i, (_, a)) in placements.iter().enumerate() {
            for (_, b) in &placements[i + 1..] {
                assert!(!overlaps(a, b));
            }
        }
    }

    #[test]
    fn full_atlas_evicts_least_recently_drawn() {
        //16px atlas: four 8px quadrants
        let mut atlas = Atlas::new(4);
        let ids: Vec<_> = (0..4).map(|_| atlas.create_reservation()).collect();
        for (tick, id) in ids.iter().enumerate() {
            assert_eq!(atlas.allocate(*id, 8, 8, tick as Tick + 1), Ok(true));
            atlas.reservations[id.0 as usize].last_drawn = tick as Tick + 1;
        }
        let newcomer = atlas.create_reservation();
        assert_eq!(atlas.allocate(newcomer, 8, 8, 10), Ok(true));
        assert!(!atlas.is_allocated(ids[0]));
        assert!(ids[1..].iter().all(|id| atlas.is_allocated(*id)));
        assert_eq!(atlas.placement(newcomer).unwrap().x, 0);
        assert_eq!(atlas.count(), 4);
    }

    #[test]
    fn same_tick_candidate_is_refused() {
        let mut atlas = Atlas::new(2);
        let a = atlas.create_reservation();
        let b = atlas.create_reservation();
        for id in [a, b] {
            atlas.reservations[id.0 as usize].last_drawn = 5;
        }
        let filler: Vec<_> = (0..4).map(|_| atlas.create_reservation()).collect();
        for id in &filler {
            assert_eq!(atlas.allocate(*id, 2, 2, 5), Ok(true));
            atlas.reservations[id.0 as usize].last_drawn = 5;
        }
        let late = atlas.create_reservation();
        assert_eq!(atlas.allocate(late, 1, 1, 5), Ok(false));
        assert_eq!(atlas.count(), 4);
        atlas.placements();
        //next tick the oldest may go
        assert_eq!(atlas.allocate(late, 1, 1, 6), Ok(true));
    }

    #[test]
    fn coarse_victim_is_split_to_fit() {
        let mut atlas = Atlas::new(4);
        let big: Vec<_> = (0..4).map(|_| atlas.create_reservation()).collect();
        for (i, id) in big.iter().enumerate() {
            assert_eq!(atlas.allocate(*id, 8, 8, 1), Ok(true));
            atlas.reservations[id.0 as usize].last_drawn = 10 + i as Tick;
        }
        let small = atlas.create_reservation();
        assert_eq!(atlas.allocate(small, 1, 1, 20), Ok(true));
        let p = atlas.placement(small).unwrap();
        assert_eq!((p.x, p.y, p.level), (0, 0, 0));
        assert!(!atlas.is_allocated(big[0]));
        //a second small request reuses the split quadrant without evicting more
        let second = atlas.create_reservation();
        assert_eq!(atlas.allocate(second, 2, 2, 20), Ok(true));
        assert!(atlas.placement(second).unwrap().x < 8);
        assert!(big[1..].iter().all(|id| atlas.is_allocated(*id)));
        atlas.placements();
    }

    #[test]
    fn evicting_a_subtree_unplaces_everything_below() {
        let mut atlas = Atlas::new(3);
        let small: Vec<_> = (0..4).map(|_| atlas.create_reservation()).collect();
        for id in &small {
            assert_eq!(atlas.allocate(*id, 2, 2, 1), Ok(true));
        }
        //all four landed in the first 4px quadrant
        assert!(small.iter().all(|id| {
            let p = atlas.placement(*id).unwrap();
            p.x < 4 && p.y < 4
        }));
        let others: Vec<_> = (0..3).map(|_| atlas.create_reservation()).collect();
        for id in &others {
            assert_eq!(atlas.allocate(*id, 4, 4, 2), Ok(true));
            atlas.reservations[id.0 as usize].last_drawn = 2;
        }
        let nodes_before = atlas.node_count();
        let big = atlas.create_reservation();
        assert_eq!(atlas.allocate(big, 3, 4, 3), Ok(true));
        assert!(small.iter().all(|id| !atlas.is_allocated(*id)));
        assert!(atlas.node_count() < nodes_before);
        assert_eq!(atlas.count(), 4);
        atlas.placements();
    }

    #[test]
    fn oversized_request_takes_the_whole_atlas() {
        let mut atlas = Atlas::new(4);
        let small: Vec<_> = (0..3).map(|_| atlas.create_reservation()).collect();
        for id in &small {
            assert_eq!(atlas.allocate(*id, 4, 4, 1), Ok(true));
            atlas.reservations[id.0 as usize].last_drawn = 1;
        }
        let big = atlas.create_reservation();
        //the small ones are still on screen this tick
        assert_eq!(atlas.allocate(big, 9, 16, 1), Ok(false));
        assert_eq!(atlas.count(), 3);

        assert_eq!(atlas.allocate(big, 9, 16, 2), Ok(true));
        let p = atlas.placement(big).unwrap();
        assert_eq!((p.x, p.y, p.level), (0, 0, 4));
        assert!(small.iter().all(|id| !atlas.is_allocated(*id)));
        assert_eq!(atlas.count(), 1);
        assert_eq!(atlas.node_count(), 1);
        atlas.placements();

        //a later small request displaces it once it is stale
        atlas.reservations[big.0 as usize].last_drawn = 2;
        assert_eq!(atlas.allocate(small[0], 1, 1, 2), Ok(false));
        assert_eq!(atlas.allocate(small[0], 1, 1, 3), Ok(true));
        assert!(!atlas.is_allocated(big));
        assert_eq!(atlas.count(), 1);
        atlas.placements();

        atlas.release(small[0], 3).unwrap();
        assert_eq!(atlas.allocate(big, 16, 16, 4), Ok(true));
        atlas.release(big, 4).unwrap();
        assert_eq!(atlas.count(), 0);
        assert_eq!(atlas.placements().len(), 0);
    }

    #[test]
    fn release_frees_space_for_reuse() {
        let mut atlas = Atlas::new(2);
        let a = atlas.create_reservation();
        assert_eq!(atlas.allocate(a, 2, 2, 1), Ok(true));
        atlas.release(a, 1).unwrap();
        assert_eq!(atlas.count(), 0);
        let b = atlas.create_reservation();
        assert_eq!(atlas.allocate(b, 2, 2, 1), Ok(true));
        assert_eq!(atlas.placement(b).unwrap().x, 0);
    }

    #[test]
    fn contract_violations() {
        let mut atlas = Atlas::new(4);
        let id = atlas.create_reservation();
        assert_eq!(
            atlas.allocate(id, 0, 3, 1),
            Err(AtlasError::EmptyRequest {
                width: 0,
                height: 3
            })
        );
        assert_eq!(
            atlas.allocate(id, 17, 1, 1),
            Err(AtlasError::RequestTooLarge {
                width: 17,
                height: 1,
                size: 16
            })
        );
        assert_eq!(
            atlas.allocate(ReservationId(99), 1, 1, 1),
            Err(AtlasError::UnknownReservation(ReservationId(99)))
        );
    }
}
