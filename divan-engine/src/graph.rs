//! Realtime synthesis graph core.
//!
//! This module defines the [`Graph`]: an arena of
//! [`NodeKind`]s wired into a DAG that ends in a single destination sink. The graph
//! owns the context clock (a frame counter) and produces one **stereo** frame at a
//! time.
//!
//! Lifecycle
//! - Nodes are *held* by whoever created them until [`Graph::release`] is called.
//! - After every block the graph reclaims released nodes that can no longer make
//!   sound: sources whose stop time has passed (or that were never started), then
//!   processors left with no inputs. Fire-and-forget voices release everything
//!   right after scheduling and are cleaned up once they finish playing.
//!
//! Design goals
//! - No allocation per sample: node outputs live in a flat vector indexed by slot
//! - Evaluation order is a topological sort, recomputed only when wiring changes
//! - Block housekeeping (sorting, reclamation) works in scratch buffers kept on
//!   the graph, so the audio thread only allocates when the graph grows

use log::trace;

use crate::nodes::{Frame, NodeKind, Param, ParamMods, SILENCE};
use divan_core::automation::Automation;

/// Handle to a node in a [`Graph`]. Stale handles (to reclaimed nodes) are ignored by every method.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    inputs: Vec<NodeId>,
    mods: Vec<(Param, NodeId)>,
    released: bool,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Signal graph plus the context clock.
#[derive(Debug)]
pub struct Graph {
    sr: f32,
    frame: u64,
    slots: Vec<Slot>,
    free: Vec<u32>,
    outs: Vec<Frame>,
    order: Vec<u32>,
    dirty: bool,
    destination: NodeId,
    // scratch for `rebuild_order` and `collect`
    indegree: Vec<usize>,
    outgoing: Vec<Vec<u32>>,
    ready: Vec<u32>,
    dead: Vec<NodeId>,
}

impl Graph {
    pub fn new(sr: f32) -> Self {
        let mut g = Self {
            sr: sr.max(1.0),
            frame: 0,
            slots: Vec::new(),
            free: Vec::new(),
            outs: Vec::new(),
            order: Vec::new(),
            dirty: true,
            destination: NodeId { index: 0, generation: 0 },
            indegree: Vec::new(),
            outgoing: Vec::new(),
            ready: Vec::new(),
            dead: Vec::new(),
        };
        g.destination = g.add(NodeKind::Destination);
        g
    }

    /// Context time in seconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.frame as f64 / f64::from(self.sr)
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }
    #[inline] pub fn destination(&self) -> NodeId { self.destination }

    /// Change the rate; the clock keeps its position in seconds and filters
    /// recompute their coefficients.
    pub fn set_sample_rate(&mut self, sr: f32) {
        let now = self.now();
        self.sr = sr.max(1.0);
        self.frame = (now * f64::from(self.sr)).round() as u64;
        for node in self.slots.iter_mut().filter_map(|s| s.node.as_mut()) {
            if let NodeKind::Filter { left, right, .. } = &mut node.kind {
                left.set_sample_rate(self.sr);
                right.set_sample_rate(self.sr);
            }
        }
    }

    /// Number of live nodes, including the destination.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    /// Number of live nodes matching `pred`.
    pub fn count_where(&self, pred: impl Fn(&NodeKind) -> bool) -> usize {
        self.slots.iter().filter_map(|s| s.node.as_ref()).filter(|n| pred(&n.kind)).count()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    /// Insert a node; the caller holds it until [`Graph::release`].
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let node = Node { kind, inputs: Vec::new(), mods: Vec::new(), released: false };
        self.dirty = true;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            self.outs[index as usize] = SILENCE;
            return NodeId { index, generation: slot.generation };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, node: Some(node) });
        self.outs.push(SILENCE);
        NodeId { index, generation: 0 }
    }

    /// Route the output of `src` into `dst`. Returns false on stale handles.
    pub fn connect(&mut self, src: NodeId, dst: NodeId) -> bool {
        if !self.contains(src) || src == dst {
            return false;
        }
        let Some(node) = self.node_mut(dst) else { return false };
        if !node.inputs.contains(&src) {
            node.inputs.push(src);
        }
        self.dirty = true;
        true
    }

    /// Route the output of `src` (left channel) into parameter `param` of `dst`,
    /// where it is added to the parameter's automation value every sample.
    pub fn connect_param(&mut self, src: NodeId, dst: NodeId, param: Param) -> bool {
        if !self.contains(src) || src == dst {
            return false;
        }
        let Some(node) = self.node_mut(dst) else { return false };
        if node.kind.param(param).is_none() {
            return false;
        }
        node.mods.push((param, src));
        self.dirty = true;
        true
    }

    /// Remove every connection leaving `src`.
    pub fn disconnect(&mut self, src: NodeId) {
        for node in self.slots.iter_mut().filter_map(|s| s.node.as_mut()) {
            node.inputs.retain(|i| *i != src);
            node.mods.retain(|(_, i)| *i != src);
        }
        self.dirty = true;
    }

    /// Schedule a source to begin at `at` seconds. Ignored for non-sources and already started sources.
    pub fn start(&mut self, id: NodeId, at: f64) {
        if let Some(span) = self.node_mut(id).and_then(|n| n.kind.span_mut()) {
            if span.start.is_none() {
                span.start = Some(at);
            }
        }
    }

    /// Schedule a source to end at `at` seconds. A later call replaces the stop time.
    pub fn stop(&mut self, id: NodeId, at: f64) {
        if let Some(span) = self.node_mut(id).and_then(|n| n.kind.span_mut()) {
            span.stop = Some(at);
        }
    }

    pub fn param(&self, id: NodeId, p: Param) -> Option<&Automation> {
        self.node(id).and_then(|n| n.kind.param(p))
    }

    pub fn param_mut(&mut self, id: NodeId, p: Param) -> Option<&mut Automation> {
        self.node_mut(id).and_then(|n| n.kind.param_mut(p))
    }

    /// Instantaneous automation value of `p` on `id` (modulation excluded).
    pub fn param_value(&self, id: NodeId, p: Param) -> Option<f32> {
        let now = self.now();
        self.param(id, p).map(|a| a.value_at(now))
    }

    /// Drop the caller's hold on `id`; the node is reclaimed once it goes quiet.
    pub fn release(&mut self, id: NodeId) {
        if id == self.destination {
            return;
        }
        if let Some(node) = self.node_mut(id) {
            node.released = true;
        }
    }

    fn reclaimable(node: &Node) -> bool {
        if !node.released {
            return false;
        }
        match node.kind.span() {
            Some(span) => span.ended || span.start.is_none(),
            None => node.inputs.is_empty() && node.mods.is_empty(),
        }
    }

    /// Reclaim released nodes that can no longer sound. Returns how many were removed.
    pub fn collect(&mut self) -> usize {
        let mut removed = 0;
        let mut dead = core::mem::take(&mut self.dead);
        loop {
            dead.clear();
            dead.extend(self.slots.iter().enumerate().filter_map(|(i, s)| {
                let node = s.node.as_ref()?;
                Self::reclaimable(node).then_some(NodeId { index: i as u32, generation: s.generation })
            }));
            if dead.is_empty() {
                break;
            }
            for id in &dead {
                self.disconnect(*id);
                self.slots[id.index as usize].node = None;
                self.outs[id.index as usize] = SILENCE;
                self.free.push(id.index);
            }
            removed += dead.len();
        }
        self.dead = dead;
        if removed > 0 {
            trace!("graph: reclaimed {removed} nodes, {} live", self.node_count());
            self.dirty = true;
        }
        removed
    }

    /// Fold finished automation into intrinsic values on every node.
    pub fn settle(&mut self) {
        let now = self.now();
        for node in self.slots.iter_mut().filter_map(|s| s.node.as_mut()) {
            node.kind.settle(now);
        }
    }

    /// Housekeeping to run once per rendered block.
    pub fn end_block(&mut self) {
        self.settle();
        self.collect();
    }

    /// Kahn's algorithm over node and parameter edges. Nodes caught in a cycle
    /// are appended last and read their inputs' previous-sample outputs.
    fn rebuild_order(&mut self) {
        let n = self.slots.len();
        let mut indegree = core::mem::take(&mut self.indegree);
        let mut outgoing = core::mem::take(&mut self.outgoing);
        let mut ready = core::mem::take(&mut self.ready);
        indegree.clear();
        indegree.resize(n, 0);
        outgoing.truncate(n);
        outgoing.iter_mut().for_each(Vec::clear);
        outgoing.resize_with(n, Vec::new);

        for (i, slot) in self.slots.iter().enumerate() {
            let Some(node) = &slot.node else { continue };
            for src in node.inputs.iter().chain(node.mods.iter().map(|(_, s)| s)) {
                indegree[i] += 1;
                outgoing[src.index as usize].push(i as u32);
            }
        }

        self.order.clear();
        ready.clear();
        ready.extend((0..n as u32).filter(|&i| self.slots[i as usize].node.is_some() && indegree[i as usize] == 0));
        while let Some(i) = ready.pop() {
            self.order.push(i);
            for &dst in &outgoing[i as usize] {
                indegree[dst as usize] -= 1;
                if indegree[dst as usize] == 0 {
                    ready.push(dst);
                }
            }
        }
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.node.is_some() && indegree[i] > 0 {
                self.order.push(i as u32);
            }
        }

        self.indegree = indegree;
        self.outgoing = outgoing;
        self.ready = ready;
        self.dirty = false;
    }

    /// Render one frame and advance the clock.
    pub fn render_frame(&mut self) -> Frame {
        if self.dirty {
            self.rebuild_order();
        }
        let t = self.now();
        let sr = self.sr;

        for &i in &self.order {
            let Some(node) = self.slots[i as usize].node.as_mut() else { continue };
            let mut input = SILENCE;
            for src in &node.inputs {
                let o = self.outs[src.index as usize];
                input[0] += o[0];
                input[1] += o[1];
            }
            let mut mods: ParamMods = [0.0; Param::COUNT];
            for (p, src) in &node.mods {
                mods[p.index()] += self.outs[src.index as usize][0];
            }
            self.outs[i as usize] = node.kind.process(input, &mods, t, sr);
        }

        self.frame += 1;
        let out = self.outs[self.destination.index as usize];
        [out[0].clamp(-1.0, 1.0), out[1].clamp(-1.0, 1.0)]
    }

    /// Render `frames.len()` frames, then run block housekeeping.
    pub fn render(&mut self, frames: &mut [Frame]) {
        for f in frames.iter_mut() {
            *f = self.render_frame();
        }
        self.end_block();
    }
}

// ------------------------------------ Tests --------------------------------------
