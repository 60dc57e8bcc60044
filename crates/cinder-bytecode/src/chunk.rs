//! Instruction chunks and labels
//!
//! A [`Chunk`] is the instruction list of one function body under
//! construction. It also owns the label marks placed inside it. Once the
//! body is complete the chunk is finalized: every [`Target::Label`] is
//! rewritten to an absolute [`Target::Offset`].

use crate::instruction::{Instruction, Target};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

/// Label handle
///
/// `generation` identifies the compile that allocated the label, so a label
/// leaking from one compile into another is detected at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelId {
    /// Index within the allocating compile
    pub index: u32,
    /// Allocating compile
    pub generation: u32,
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}.{}", self.generation, self.index)
    }
}

/// Hands out labels for a single compile
#[derive(Debug)]
pub struct LabelAllocator {
    generation: u32,
    next: u32,
}

impl LabelAllocator {
    /// Create an allocator with a fresh generation
    pub fn new() -> Self {
        Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            next: 0,
        }
    }

    /// Allocate a new label
    pub fn make(&mut self) -> LabelId {
        let label = LabelId {
            index: self.next,
            generation: self.generation,
        };
        self.next += 1;
        label
    }

    /// Generation of this compile
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of labels allocated so far
    pub fn allocated(&self) -> u32 {
        self.next
    }
}

impl Default for LabelAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Label resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// A jump references a label that was never placed in this chunk
    #[error("dangling label {label} referenced at instruction {at}")]
    DanglingLabel {
        /// Unplaced label
        label: LabelId,
        /// Referencing instruction
        at: usize,
    },

    /// A label from another compile
    #[error("stale label {label} (expected generation {expected})")]
    StaleLabel {
        /// Offending label
        label: LabelId,
        /// Generation of the current compile
        expected: u32,
    },

    /// The same label placed twice
    #[error("label {label} placed more than once")]
    DuplicateLabel {
        /// Offending label
        label: LabelId,
    },
}

/// Instruction list with owned label marks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    code: Vec<Instruction>,
    marks: Vec<(LabelId, u32)>,
}

impl Chunk {
    /// Create an empty chunk
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction
    #[inline]
    pub fn emit(&mut self, instr: Instruction) {
        self.code.push(instr);
    }

    /// Mark `label` at the current end of the chunk
    pub fn place(&mut self, label: LabelId) {
        self.marks.push((label, self.code.len() as u32));
    }

    /// Number of instructions
    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether the chunk holds no instructions
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Resolve every label into an absolute offset
    pub fn finalize(self, generation: u32) -> Result<FinalizedChunk, ChunkError> {
        let mut positions: FxHashMap<LabelId, u32> = FxHashMap::default();
        for (label, pos) in &self.marks {
            if label.generation != generation {
                return Err(ChunkError::StaleLabel {
                    label: *label,
                    expected: generation,
                });
            }
            if positions.insert(*label, *pos).is_some() {
                return Err(ChunkError::DuplicateLabel { label: *label });
            }
        }

        let mut code = self.code;
        for (at, instr) in code.iter_mut().enumerate() {
            if let Some(target) = instr.target_mut() {
                if let Target::Label(label) = *target {
                    if label.generation != generation {
                        return Err(ChunkError::StaleLabel {
                            label,
                            expected: generation,
                        });
                    }
                    let pos = positions
                        .get(&label)
                        .copied()
                        .ok_or(ChunkError::DanglingLabel { label, at })?;
                    *target = Target::Offset(pos);
                }
            }
        }

        Ok(FinalizedChunk { code })
    }
}

/// Chunk with every jump target resolved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalizedChunk {
    /// Resolved instructions
    pub code: Vec<Instruction>,
}

impl FinalizedChunk {
    /// Number of instructions
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether the chunk holds no instructions
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}
