//! Ordered effect chains and the listener-attached graph

use std::sync::{Mutex, MutexGuard, TryLockError};

use super::Effect;
use crate::types::PlanarBuffer;

/// Ordered chain of effect nodes
#[derive(Default)]
pub struct EffectGraph {
    nodes: Vec<Box<dyn Effect>>,
}

impl EffectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: impl Effect + 'static) -> Self {
        self.push(node);
        self
    }

    pub fn push(&mut self, node: impl Effect + 'static) {
        self.nodes.push(Box::new(node));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> Option<&dyn Effect> {
        self.nodes.get(index).map(|n| n.as_ref())
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut (dyn Effect + 'static)> {
        self.nodes.get_mut(index).map(|n| n.as_mut())
    }

    /// Set a node parameter (normalized); unknown indices are ignored
    pub fn set_param(&mut self, node: usize, param: usize, value: f32) {
        if let Some(node) = self.nodes.get_mut(node) {
            node.set_param(param, value);
        }
    }

    /// Run every non-bypassed node in order
    pub fn process(&mut self, buffer: &mut PlanarBuffer, scratch: &mut PlanarBuffer) {
        for node in &mut self.nodes {
            if !node.is_bypassed() {
                node.process(buffer, scratch);
            }
        }
    }

    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
    }
}

impl std::fmt::Debug for EffectGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.nodes.iter().map(|n| &n.info().name))
            .finish()
    }
}

/// Effect graph attached to the listener
///
/// Shared between the host (which edits parameters) and the audio thread
/// (which runs it). The audio thread only ever `try_lock`s; while the host
/// holds the lock the graph is skipped for that tick.
#[derive(Debug)]
pub struct ListenerGraph {
    graph: Mutex<EffectGraph>,
}

impl ListenerGraph {
    pub fn new(graph: EffectGraph) -> Self {
        Self {
            graph: Mutex::new(graph),
        }
    }

    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, EffectGraph>> {
        match self.graph.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Edit the graph from a non-real-time thread
    pub fn with_graph<R>(&self, f: impl FnOnce(&mut EffectGraph) -> R) -> R {
        let mut guard = self
            .graph
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}
