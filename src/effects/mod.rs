// src/effects/mod.rs
//
// Reconfigurable effect chain over a bound audio source. The chain is a flat
// ordered list of processors; any parameter or topology change tears the old
// processors down and rebuilds the whole chain from the node list.

pub mod chorus;
pub mod compressor;
pub mod delay;
pub mod equalizer;
pub mod reverb;

use crate::error::CoreError;
use chorus::Chorus;
use compressor::Compressor;
use delay::Delay;
use equalizer::ThreeBandEq;
use log::{debug, info};
use reverb::ConvolutionReverb;
use serde::{Deserialize, Serialize};

/// Format of the signal an effects graph is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBinding {
    pub sample_rate: u32,
    pub channels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqualizerParams {
    pub low_gain_db: f32,
    pub mid_gain_db: f32,
    pub high_gain_db: f32,
}

impl Default for EqualizerParams {
    fn default() -> Self {
        Self {
            low_gain_db: 0.0,
            mid_gain_db: 0.0,
            high_gain_db: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 3.0,
            attack_secs: 0.003,
            release_secs: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbParams {
    pub room_size: f32,
    pub damping: f32,
    pub wet_level: f32,
    pub dry_level: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            room_size: 0.3,
            damping: 0.5,
            wet_level: 0.3,
            dry_level: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayParams {
    pub delay_secs: f32,
    pub feedback: f32,
    pub wet_level: f32,
    pub dry_level: f32,
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            delay_secs: 0.3,
            feedback: 0.25,
            wet_level: 0.3,
            dry_level: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChorusParams {
    pub rate_hz: f32,
    pub depth: f32,
    pub wet_level: f32,
    pub dry_level: f32,
}

impl Default for ChorusParams {
    fn default() -> Self {
        Self {
            rate_hz: 1.5,
            depth: 0.3,
            wet_level: 0.4,
            dry_level: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    Equalizer,
    Compressor,
    Reverb,
    Delay,
    Chorus,
}

/// One entry in the effect order, carrying its own parameter record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EffectNode {
    Equalizer { params: EqualizerParams, enabled: bool },
    Compressor { params: CompressorParams, enabled: bool },
    Reverb { params: ReverbParams, enabled: bool },
    Delay { params: DelayParams, enabled: bool },
    Chorus { params: ChorusParams, enabled: bool },
}

impl EffectNode {
    /// Node of the given kind with default parameters, enabled.
    pub fn with_defaults(kind: EffectKind) -> Self {
        match kind {
            EffectKind::Equalizer => Self::Equalizer {
                params: EqualizerParams::default(),
                enabled: true,
            },
            EffectKind::Compressor => Self::Compressor {
                params: CompressorParams::default(),
                enabled: true,
            },
            EffectKind::Reverb => Self::Reverb {
                params: ReverbParams::default(),
                enabled: true,
            },
            EffectKind::Delay => Self::Delay {
                params: DelayParams::default(),
                enabled: true,
            },
            EffectKind::Chorus => Self::Chorus {
                params: ChorusParams::default(),
                enabled: true,
            },
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Equalizer { .. } => EffectKind::Equalizer,
            Self::Compressor { .. } => EffectKind::Compressor,
            Self::Reverb { .. } => EffectKind::Reverb,
            Self::Delay { .. } => EffectKind::Delay,
            Self::Chorus { .. } => EffectKind::Chorus,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            Self::Equalizer { enabled, .. }
            | Self::Compressor { enabled, .. }
            | Self::Reverb { enabled, .. }
            | Self::Delay { enabled, .. }
            | Self::Chorus { enabled, .. } => *enabled,
        }
    }
}

enum Processor {
    Equalizer(ThreeBandEq),
    Compressor(Compressor),
    Reverb(ConvolutionReverb),
    Delay(Delay),
    Chorus(Chorus),
}

impl Processor {
    fn build(node: &EffectNode, binding: SourceBinding) -> Self {
        let sr = binding.sample_rate;
        let ch = binding.channels.max(1);
        match node {
            EffectNode::Equalizer { params, .. } => Self::Equalizer(ThreeBandEq::new(sr, ch, *params)),
            EffectNode::Compressor { params, .. } => Self::Compressor(Compressor::new(sr, *params)),
            EffectNode::Reverb { params, .. } => Self::Reverb(ConvolutionReverb::new(sr, ch, *params)),
            EffectNode::Delay { params, .. } => Self::Delay(Delay::new(sr, ch, *params)),
            EffectNode::Chorus { params, .. } => Self::Chorus(Chorus::new(sr, ch, *params)),
        }
    }

    fn process_block(&mut self, buffer: &mut [f32]) {
        match self {
            Self::Equalizer(p) => p.process_block(buffer),
            Self::Compressor(p) => p.process_block(buffer),
            Self::Reverb(p) => p.process_block(buffer),
            Self::Delay(p) => p.process_block(buffer),
            Self::Chorus(p) => p.process_block(buffer),
        }
    }
}

/// Ordered effect chain bound to one source at a time.
///
/// Insertion order of the node list is the processing order. Parameter edits
/// replace the matching node in place, never reorder it, and rebuild the DSP
/// chain so every processor starts from fresh state.
#[derive(Default)]
pub struct EffectsGraph {
    binding: Option<SourceBinding>,
    nodes: Vec<EffectNode>,
    chain: Vec<Processor>,
}

impl EffectsGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the graph to a source. Binding twice without a teardown is an
    /// error rather than a silent rebind.
    pub fn initialize(&mut self, binding: SourceBinding) -> Result<(), CoreError> {
        if self.binding.is_some() {
            return Err(CoreError::InvalidState(
                "effects graph already bound, call teardown first",
            ));
        }
        info!(
            "effects graph bound: {} ch @ {} Hz",
            binding.channels, binding.sample_rate
        );
        self.binding = Some(binding);
        self.rebuild();
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Replace the whole effect order. Disabled nodes stay in the list but
    /// contribute no processor.
    pub fn set_active_effects(&mut self, nodes: Vec<EffectNode>) {
        self.nodes = nodes;
        self.rebuild();
    }

    /// Update the parameters of the node with the same kind, keeping its
    /// position. Unknown kinds are ignored.
    pub fn update_effect(&mut self, node: EffectNode) {
        let kind = node.kind();
        if let Some(slot) = self.nodes.iter_mut().find(|n| n.kind() == kind) {
            *slot = node;
            self.rebuild();
        } else {
            debug!("update for absent effect {kind:?} ignored");
        }
    }

    pub fn nodes(&self) -> &[EffectNode] {
        &self.nodes
    }

    /// Kinds in the active processing order, for inspection.
    pub fn chain_kinds(&self) -> Vec<EffectKind> {
        self.nodes
            .iter()
            .filter(|n| n.enabled())
            .map(|n| n.kind())
            .collect()
    }

    /// Run one interleaved block through the chain in place. Unbound graphs
    /// and empty chains pass the signal through untouched.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for processor in &mut self.chain {
            processor.process_block(buffer);
        }
    }

    /// Drop the binding and every processor. The graph can be initialized
    /// against a new source afterwards.
    pub fn teardown(&mut self) {
        self.binding = None;
        self.chain.clear();
        self.nodes.clear();
    }

    fn rebuild(&mut self) {
        self.chain.clear();
        let Some(binding) = self.binding else {
            return;
        };
        for node in self.nodes.iter().filter(|n| n.enabled()) {
            self.chain.push(Processor::build(node, binding));
        }
        debug!("effects chain rebuilt: {:?}", self.chain_kinds());
    }
}
