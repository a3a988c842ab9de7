//! WriteSide and ReadSide state machines
//!
//! Both sides share one phase type and are advanced by pure step functions.
//! A step never touches the device: it returns the next phase and the chunk
//! (if any) the controller must move before committing that phase.
//!
//! ```text
//! Idle ──► Active { cursor } ──► Active { cursor + chunk } ── … ──► Finished
//!                 │                                                   ▲
//!                 └──── cursor == body_length: short remainder op ────┘
//! ```

use crate::plan::{Chunk, ChunkPlan};

/// Phase of one side of the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started
    Idle,
    /// Moving chunks; `cursor` is the next element offset
    Active {
        /// Next element offset
        cursor: usize,
    },
    /// All chunks moved
    Finished,
}

impl Phase {
    /// Element cursor of this side (`0` while idle, `length` when finished)
    pub const fn cursor(&self, plan: &ChunkPlan) -> usize {
        match self {
            Self::Idle => 0,
            Self::Active { cursor } => *cursor,
            Self::Finished => plan.length(),
        }
    }

    /// Whether this side has reached its terminal phase
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Phase after the step
    pub next: Phase,
    /// Chunk to move during this step
    pub op: Option<Chunk>,
}

impl Step {
    const fn idle(next: Phase) -> Self {
        Self { next, op: None }
    }

    const fn moving(next: Phase, chunk: Chunk) -> Self {
        Self {
            next,
            op: Some(chunk),
        }
    }
}

/// Shared `Active` transition: a full chunk while inside the body, then the
/// short remainder (if any) together with the move to `Finished`.
const fn advance_active(cursor: usize, plan: &ChunkPlan) -> Step {
    if cursor < plan.body_length() {
        let chunk = Chunk::new(cursor, plan.chunk_size());
        Step::moving(
            Phase::Active {
                cursor: cursor + plan.chunk_size(),
            },
            chunk,
        )
    } else if plan.remainder() != 0 {
        Step::moving(Phase::Finished, Chunk::new(cursor, plan.remainder()))
    } else {
        Step::idle(Phase::Finished)
    }
}

/// Advance the WriteSide by one controller iteration
pub const fn advance_write(phase: Phase, plan: &ChunkPlan) -> Step {
    match phase {
        Phase::Idle => Step::idle(Phase::Active { cursor: 0 }),
        Phase::Active { cursor } => advance_active(cursor, plan),
        Phase::Finished => Step::idle(Phase::Finished),
    }
}

/// Advance the ReadSide by one controller iteration
///
/// `writer` is the WriteSide phase as of this iteration (already advanced).
/// Reading starts once `lead_elements` have been written, or once the writer
/// has finished, whichever comes first. The gate is only consulted in
/// `Idle`; once reading has begun it is not re-armed.
pub const fn advance_read(
    phase: Phase,
    plan: &ChunkPlan,
    writer: Phase,
    lead_elements: usize,
) -> Step {
    match phase {
        Phase::Idle => {
            if writer.is_finished() || writer.cursor(plan) >= lead_elements {
                Step::idle(Phase::Active { cursor: 0 })
            } else {
                Step::idle(Phase::Idle)
            }
        }
        Phase::Active { cursor } => advance_active(cursor, plan),
        Phase::Finished => Step::idle(Phase::Finished),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(length: usize, chunk: usize) -> ChunkPlan {
        ChunkPlan::new(length, chunk).unwrap()
    }

    #[test]
    fn test_write_idle_starts_at_zero() {
        let step = advance_write(Phase::Idle, &plan(100, 40));
        assert_eq!(step.next, Phase::Active { cursor: 0 });
        assert_eq!(step.op, None);
    }

    #[test]
    fn test_write_body_then_remainder() {
        let p = plan(100, 40);
        let step = advance_write(Phase::Active { cursor: 40 }, &p);
        assert_eq!(step.next, Phase::Active { cursor: 80 });
        assert_eq!(step.op, Some(Chunk::new(40, 40)));

        let step = advance_write(Phase::Active { cursor: 80 }, &p);
        assert_eq!(step.next, Phase::Finished);
        assert_eq!(step.op, Some(Chunk::new(80, 20)));
    }

    #[test]
    fn test_no_remainder_finishes_without_op() {
        let step = advance_write(Phase::Active { cursor: 80 }, &plan(80, 40));
        assert_eq!(step, Step::idle(Phase::Finished));
    }

    #[test]
    fn test_finished_is_terminal() {
        let p = plan(10, 4);
        assert_eq!(advance_write(Phase::Finished, &p), Step::idle(Phase::Finished));
        assert_eq!(
            advance_read(Phase::Finished, &p, Phase::Finished, 0),
            Step::idle(Phase::Finished)
        );
    }

    #[test]
    fn test_read_waits_for_lead() {
        let p = plan(100, 40);
        let step = advance_read(Phase::Idle, &p, Phase::Active { cursor: 40 }, 80);
        assert_eq!(step, Step::idle(Phase::Idle));

        let step = advance_read(Phase::Idle, &p, Phase::Active { cursor: 80 }, 80);
        assert_eq!(step, Step::idle(Phase::Active { cursor: 0 }));
    }

    #[test]
    fn test_read_released_by_finished_writer() {
        // Lead beyond the buffer degrades to write-then-read.
        let p = plan(100, 40);
        let step = advance_read(Phase::Idle, &p, Phase::Active { cursor: 80 }, 500);
        assert_eq!(step.next, Phase::Idle);

        let step = advance_read(Phase::Idle, &p, Phase::Finished, 500);
        assert_eq!(step.next, Phase::Active { cursor: 0 });
    }

    #[test]
    fn test_zero_lead_starts_immediately() {
        let step = advance_read(Phase::Idle, &plan(10, 16), Phase::Active { cursor: 0 }, 0);
        assert_eq!(step.next, Phase::Active { cursor: 0 });
    }

    #[test]
    fn test_cursor_accounting() {
        let p = plan(100, 40);
        assert_eq!(Phase::Idle.cursor(&p), 0);
        assert_eq!(Phase::Active { cursor: 80 }.cursor(&p), 80);
        assert_eq!(Phase::Finished.cursor(&p), 100);
    }
}
