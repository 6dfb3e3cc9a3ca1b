//! A posed, playable instance of a shared [`Shape`].
//!
//! The instance owns its threads, per-node masks and callbacks, transition
//! state, output buffers and a scratch arena. Shape data stays behind an
//! `Arc` and is never mutated, so many instances can share one shape.

use std::sync::Arc;

use log::{debug, warn};
use nalgebra::Matrix4;

use crate::callback::{NodeCallback, NodeCallbackEntry};
use crate::config::Config;
use crate::error::{Result, SkeletonError};
use crate::evaluator::{animate_nodes, multiply_hierarchy, sort_threads, NodeOutputs, NodePass};
use crate::ids::{IdAllocator, ThreadId};
use crate::ik::IkStats;
use crate::node_state::{DirtyFlags, NodeMasks, NodeState};
use crate::objects::{animate_frame, animate_mat_frame, animate_visibility};
use crate::scratch::Scratch;
use crate::shape::{ObjectState, Shape};
use crate::thread::Thread;
use crate::transform::compose;
use crate::transition::{LocalPose, TransitionState};

pub struct ShapeInstance {
    shape: Arc<Shape>,
    config: Config,
    ids: IdAllocator,
    /// Kept in evaluation order once `THREAD` dirtiness is resolved.
    threads: Vec<Thread>,
    transitions: TransitionState,
    masks: NodeMasks,
    callbacks: Vec<NodeCallbackEntry>,
    dirty: Vec<DirtyFlags>,
    local: Vec<Matrix4<f32>>,
    pose: LocalPose,
    global: Vec<Matrix4<f32>>,
    morph_weights: Vec<f32>,
    object_states: Vec<ObjectState>,
    triggers: u32,
    scratch: Scratch,
    ik_stats: Vec<IkStats>,
}

impl ShapeInstance {
    /// New instance in the shape's default pose. Every sub-shape starts dirty.
    pub fn new(shape: Arc<Shape>, config: Config) -> Self {
        let local: Vec<Matrix4<f32>> = shape
            .nodes
            .iter()
            .map(|n| compose(&n.default_rotation, &n.default_translation))
            .collect();
        let mut global = local.clone();
        multiply_hierarchy(&shape, 0, shape.node_count(), &local, &mut global);

        for (i, chain) in shape.ik_chains.iter().enumerate() {
            if chain.max_iterations == 0 {
                warn!("IK chain {i} (target node {}) has zero iterations and will never move", chain.target);
            }
        }

        Self {
            dirty: vec![DirtyFlags::all(); shape.sub_shapes.len()],
            morph_weights: vec![0.0; shape.num_morphs],
            object_states: shape.objects.iter().map(|o| o.default_state).collect(),
            scratch: Scratch::with_capacity(config.scratch_nodes.max(shape.node_count())),
            ids: IdAllocator::new(),
            threads: Vec::new(),
            transitions: TransitionState::default(),
            masks: NodeMasks::default(),
            callbacks: Vec::new(),
            triggers: 0,
            ik_stats: Vec::new(),
            pose: LocalPose::from_defaults(&shape),
            local,
            global,
            config,
            shape,
        }
    }

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Toggle IK without rebuilding the instance.
    pub fn set_ik_enabled(&mut self, enabled: bool) {
        if self.config.ik_enabled != enabled {
            self.config.ik_enabled = enabled;
            self.set_dirty(DirtyFlags::TRANSFORM);
        }
    }

    // ---- threads ----

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == id)
    }

    fn thread_mut(&mut self, id: ThreadId) -> Result<&mut Thread> {
        self.threads
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(SkeletonError::ThreadNotFound { id })
    }

    fn check_sequence(&self, sequence: usize) -> Result<()> {
        if sequence >= self.shape.sequences.len() {
            return Err(SkeletonError::SequenceNotFound { index: sequence });
        }
        Ok(())
    }

    /// Start playing `sequence` from its beginning.
    pub fn add_thread(&mut self, sequence: usize) -> Result<ThreadId> {
        self.check_sequence(sequence)?;
        let id = self.ids.alloc_thread();
        let th = Thread::new(id, sequence, &self.shape.sequences[sequence]);
        debug!(
            "add thread {:?} playing '{}'",
            id, self.shape.sequences[sequence].name
        );
        self.threads.push(th);
        self.set_dirty(DirtyFlags::all());
        Ok(id)
    }

    /// Stop and remove a thread. A fade it was driving ends with it.
    pub fn destroy_thread(&mut self, id: ThreadId) -> Result<()> {
        let index = self
            .threads
            .iter()
            .position(|t| t.id == id)
            .ok_or(SkeletonError::ThreadNotFound { id })?;
        let th = self.threads.remove(index);
        if th.transition.in_transition {
            self.transitions.rebuild(&self.shape, &self.threads);
        }
        debug!("destroy thread {id:?}");
        self.set_dirty(DirtyFlags::all());
        Ok(())
    }

    /// Switch sequence immediately, cancelling any fade in progress.
    pub fn set_sequence(&mut self, id: ThreadId, sequence: usize, pos: f32) -> Result<()> {
        self.check_sequence(sequence)?;
        let shape = Arc::clone(&self.shape);
        let th = self.thread_mut(id)?;
        let was_fading = th.transition.in_transition;
        th.transition.in_transition = false;
        th.set_sequence(sequence, &shape.sequences[sequence], pos);
        if was_fading {
            self.transitions.rebuild(&shape, &self.threads);
        }
        self.set_dirty(DirtyFlags::all());
        Ok(())
    }

    /// Cross-fade from the current pose into `sequence` over `duration` seconds.
    ///
    /// The current local pose of every node becomes the fade origin. With
    /// `continue_play` false the new sequence holds at `pos` until the fade ends.
    pub fn transition_to_sequence(
        &mut self,
        id: ThreadId,
        sequence: usize,
        pos: f32,
        duration: f32,
        continue_play: bool,
    ) -> Result<()> {
        self.check_sequence(sequence)?;
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(SkeletonError::InvalidDuration { duration });
        }
        self.transitions.capture_reference(&self.pose);

        let shape = Arc::clone(&self.shape);
        let th = self.thread_mut(id)?;
        let old = &shape.sequences[th.sequence];
        let t = &mut th.transition;
        if !t.in_transition {
            t.old_rotation_nodes.clear_all();
            t.old_translation_nodes.clear_all();
            t.old_scale_nodes.clear_all();
        }
        t.old_rotation_nodes.union_with(&old.rotation_matters);
        t.old_translation_nodes.union_with(&old.translation_matters);
        t.old_scale_nodes.union_with(&old.scale_matters);
        t.in_transition = true;
        t.pos = 0.0;
        t.duration = duration;
        t.continue_play = continue_play;
        t.target_scale = if continue_play { 1.0 } else { 0.0 };
        th.set_sequence(sequence, &shape.sequences[sequence], pos);

        debug!(
            "thread {id:?} transition '{}' -> '{}' over {duration}s",
            old.name, shape.sequences[sequence].name
        );
        self.transitions.rebuild(&shape, &self.threads);
        self.set_dirty(DirtyFlags::all());
        Ok(())
    }

    pub fn set_pos(&mut self, id: ThreadId, pos: f32) -> Result<()> {
        let shape = Arc::clone(&self.shape);
        let th = self.thread_mut(id)?;
        th.set_pos(pos, &shape.sequences[th.sequence]);
        self.set_dirty(DirtyFlags::all());
        Ok(())
    }

    /// Set the bracketing keys directly, for callers that drive playback themselves.
    pub fn set_keyframes(&mut self, id: ThreadId, key_num1: usize, key_num2: usize, key_pos: f32) -> Result<()> {
        let shape = Arc::clone(&self.shape);
        let th = self.thread_mut(id)?;
        let seq = &shape.sequences[th.sequence];
        for key in [key_num1, key_num2] {
            if key >= seq.num_keyframes {
                return Err(SkeletonError::KeyframeOutOfRange {
                    sequence: seq.name.clone(),
                    key,
                    count: seq.num_keyframes,
                });
            }
        }
        th.key_num1 = key_num1;
        th.key_num2 = key_num2;
        th.key_pos = key_pos.clamp(0.0, 1.0);
        self.set_dirty(DirtyFlags::all());
        Ok(())
    }

    pub fn set_time_scale(&mut self, id: ThreadId, time_scale: f32) -> Result<()> {
        self.thread_mut(id)?.time_scale = time_scale;
        Ok(())
    }

    /// Enable or disable a blend thread's contribution.
    pub fn set_blend_enabled(&mut self, id: ThreadId, enabled: bool) -> Result<()> {
        self.thread_mut(id)?.blend_disabled = !enabled;
        self.set_dirty(DirtyFlags::all());
        Ok(())
    }

    pub fn set_priority(&mut self, id: ThreadId, priority: i32) -> Result<()> {
        self.thread_mut(id)?.priority = priority;
        self.set_dirty(DirtyFlags::all());
        Ok(())
    }

    /// Advance every thread and every fade by `dt` seconds.
    pub fn advance_time(&mut self, dt: f32) {
        let mut finished = false;
        for th in &mut self.threads {
            if th.advance_transition(dt) {
                debug!("thread {:?} transition finished", th.id);
                finished = true;
            }
            let scale = th.playback_scale();
            th.advance(dt * scale, &self.shape.sequences[th.sequence]);
        }
        if finished {
            self.transitions.rebuild(&self.shape, &self.threads);
        }
        if finished || (dt != 0.0 && !self.threads.is_empty()) {
            self.set_dirty(DirtyFlags::all());
        }
    }

    pub fn in_transition(&self) -> bool {
        self.transitions.is_active()
    }

    // ---- node control ----

    fn check_node(&self, node: usize) -> Result<()> {
        if node >= self.shape.node_count() {
            return Err(SkeletonError::NodeOutOfRange {
                index: node,
                count: self.shape.node_count(),
            });
        }
        Ok(())
    }

    /// Change how threads drive `node`. Passing a callback makes it callback
    /// driven; hands-off takes precedence over everything else.
    pub fn set_node_animation_state(
        &mut self,
        node: usize,
        state: NodeState,
        callback: Option<Box<dyn NodeCallback>>,
    ) -> Result<()> {
        self.check_node(node)?;
        let state = NodeMasks::normalize(state, callback.is_some());
        self.callbacks.retain(|c| c.node != node);
        if let Some(callback) = callback.filter(|_| state.contains(NodeState::CALLBACK)) {
            self.callbacks.push(NodeCallbackEntry { node, callback });
        }
        if state == self.masks.state(node) && !state.contains(NodeState::CALLBACK) {
            return Ok(());
        }
        self.masks.apply(node, state);
        self.set_dirty(DirtyFlags::all());
        Ok(())
    }

    pub fn node_animation_state(&self, node: usize) -> Result<NodeState> {
        self.check_node(node)?;
        Ok(self.masks.state(node))
    }

    /// Overwrite a node's local transform. Only hands-off nodes keep it
    /// across a node pass.
    pub fn set_node_local_transform(&mut self, node: usize, local: Matrix4<f32>) -> Result<()> {
        self.check_node(node)?;
        self.local[node] = local;
        self.pose.record_matrix(node, &local, self.shape.scale_mode);
        self.set_dirty(DirtyFlags::TRANSFORM);
        Ok(())
    }

    // ---- evaluation ----

    pub fn set_dirty(&mut self, flags: DirtyFlags) {
        for d in &mut self.dirty {
            d.insert(flags);
        }
    }

    pub fn clear_dirty(&mut self, flags: DirtyFlags) {
        for d in &mut self.dirty {
            d.remove(flags);
        }
    }

    pub fn dirty_flags(&self, sub_shape: usize) -> Option<DirtyFlags> {
        self.dirty.get(sub_shape).copied()
    }

    /// Animate the sub-shape behind `detail`. `None` and billboard details do nothing.
    pub fn animate(&mut self, detail: Option<usize>) -> Result<()> {
        let Some(detail) = detail else {
            return Ok(());
        };
        let ss = self
            .shape
            .details
            .get(detail)
            .ok_or(SkeletonError::DetailNotFound { index: detail })?
            .sub_shape;
        match ss {
            Some(ss) => self.animate_sub_shape(ss),
            None => Ok(()),
        }
    }

    /// Re-evaluate whatever is dirty in `sub_shape`, then clear its flags.
    pub fn animate_sub_shape(&mut self, sub_shape: usize) -> Result<()> {
        let flags = self
            .dirty
            .get(sub_shape)
            .copied()
            .ok_or(SkeletonError::SubShapeNotFound { index: sub_shape })?;

        if flags.contains(DirtyFlags::THREAD) {
            self.sort_threads();
        }
        if flags.contains(DirtyFlags::TRANSFORM) {
            self.run_node_pass(sub_shape);
        }
        let objects = self.shape.sub_shapes[sub_shape].objects();
        if flags.contains(DirtyFlags::VIS) {
            animate_visibility(&self.shape, &self.threads, objects.clone(), &mut self.object_states);
        }
        if flags.contains(DirtyFlags::FRAME) {
            animate_frame(&self.shape, &self.threads, objects.clone(), &mut self.object_states);
        }
        if flags.contains(DirtyFlags::MAT_FRAME) {
            animate_mat_frame(&self.shape, &self.threads, objects, &mut self.object_states);
        }
        self.dirty[sub_shape] = DirtyFlags::empty();
        Ok(())
    }

    /// Run node passes for every sub-shape with dirty transforms.
    pub fn animate_node_subtrees(&mut self, force: bool) {
        if force {
            self.set_dirty(DirtyFlags::TRANSFORM);
        }
        if self.dirty.iter().any(|d| d.contains(DirtyFlags::THREAD)) {
            self.sort_threads();
            self.clear_dirty(DirtyFlags::THREAD);
        }
        for ss in 0..self.dirty.len() {
            if self.dirty[ss].contains(DirtyFlags::TRANSFORM) {
                self.run_node_pass(ss);
                self.dirty[ss].remove(DirtyFlags::TRANSFORM);
            }
        }
    }

    /// Fully animate every sub-shape with dirty transforms.
    pub fn animate_subtrees(&mut self, force: bool) -> Result<()> {
        if force {
            self.set_dirty(DirtyFlags::all());
        }
        for ss in 0..self.dirty.len() {
            if self.dirty[ss].contains(DirtyFlags::TRANSFORM) {
                self.animate_sub_shape(ss)?;
            }
        }
        Ok(())
    }

    fn sort_threads(&mut self) {
        sort_threads(&mut self.threads);
        self.transitions.rebuild(&self.shape, &self.threads);
    }

    fn run_node_pass(&mut self, sub_shape: usize) {
        self.ik_stats.clear();
        let pass = NodePass {
            shape: &self.shape,
            threads: &self.threads,
            masks: &self.masks,
            transitions: &self.transitions,
            config: &self.config,
        };
        let mut out = NodeOutputs {
            local: &mut self.local,
            pose: &mut self.pose,
            global: &mut self.global,
            morph_weights: &mut self.morph_weights,
            ik_stats: &mut self.ik_stats,
        };
        animate_nodes(&pass, &mut self.callbacks, sub_shape, &mut self.scratch, &mut out);
    }

    // ---- triggers ----

    fn trigger_bit(state: u32) -> Result<u32> {
        if !(1..=32).contains(&state) {
            return Err(SkeletonError::TriggerStateOutOfRange { state });
        }
        Ok(1u32 << (state - 1))
    }

    /// Trigger states are numbered 1..=32.
    pub fn set_trigger_state(&mut self, state: u32, on: bool) -> Result<()> {
        let bit = Self::trigger_bit(state)?;
        self.set_trigger_bits(bit, on);
        Ok(())
    }

    pub fn set_trigger_bits(&mut self, bits: u32, on: bool) {
        if on {
            self.triggers |= bits;
        } else {
            self.triggers &= !bits;
        }
    }

    /// Read trigger `state`, optionally clearing it.
    pub fn trigger_state(&mut self, state: u32, clear: bool) -> Result<bool> {
        let bit = Self::trigger_bit(state)?;
        let on = self.triggers & bit != 0;
        if clear {
            self.triggers &= !bit;
        }
        Ok(on)
    }

    // ---- outputs ----

    pub fn local_transforms(&self) -> &[Matrix4<f32>] {
        &self.local
    }

    pub fn global_transforms(&self) -> &[Matrix4<f32>] {
        &self.global
    }

    pub fn global_transform(&self, node: usize) -> Option<&Matrix4<f32>> {
        self.global.get(node)
    }

    pub fn morph_weights(&self) -> &[f32] {
        &self.morph_weights
    }

    pub fn object_states(&self) -> &[ObjectState] {
        &self.object_states
    }

    /// IK results of the most recent node pass.
    pub fn ik_stats(&self) -> &[IkStats] {
        &self.ik_stats
    }
}
