//! EXC_RETURN decoding and exception frame geometry.
//!
//! On exception entry the processor pushes a frame onto whichever stack was
//! active and loads LR with an EXC_RETURN value describing that frame:
//!
//! ```text
//!  bit  name   meaning
//!   0   ES     (v8-M) exception taken to the secure state
//!   2   SPSEL  1 = frame is on PSP, 0 = MSP
//!   3   Mode   1 = returning to Thread mode
//!   4   FType  0 = extended (floating-point) frame
//!   5   DCRS   (v8-M) 0 = additional state context pushed
//!   6   S      (v8-M) 1 = frame is on a secure stack
//! ```
//!
//! Frame as it sits in memory, lowest address first:
//!
//! ```text
//!  [additional state context, 10 words]  v8-M with DCRS = 0
//!      integrity signature, reserved, R4..R11
//!  basic frame, 8 words
//!      R0, R1, R2, R3, R12, LR, ReturnAddress, xPSR
//!  [FP extension, 18 words]              FType = 0
//!      S0..S15, FPSCR, reserved
//! ```

use crate::capability::Capabilities;

const SPSEL: u32 = 1 << 2;
const MODE: u32 = 1 << 3;
const FTYPE: u32 = 1 << 4;
const ES: u32 = 1 << 0;
const DCRS: u32 = 1 << 5;
const S: u32 = 1 << 6;

/// Top byte of every EXC_RETURN value.
const PREFIX_MASK: u32 = 0xFF00_0000;

/// Words in the basic frame.
pub const BASIC_FRAME_WORDS: u32 = 8;
/// Words in the Armv8-M additional state context.
pub const STATE_CONTEXT_WORDS: u32 = 10;
/// Words appended by the floating-point extension.
pub const FP_EXTENSION_WORDS: u32 = 18;

/// A decoded EXC_RETURN value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExcReturn(u32);

impl ExcReturn {
    /// Wrap a raw LR value taken on exception entry.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `true` if the value carries the EXC_RETURN prefix (`0xFF` top byte).
    #[must_use]
    pub const fn is_exc_return(self) -> bool {
        self.0 & PREFIX_MASK == PREFIX_MASK
    }

    /// The frame was pushed to the process stack.
    #[must_use]
    pub const fn uses_psp(self) -> bool {
        self.0 & SPSEL != 0
    }

    /// The fault interrupted Thread mode (as opposed to another handler).
    #[must_use]
    pub const fn thread_mode(self) -> bool {
        self.0 & MODE != 0
    }

    /// An extended floating-point frame was pushed.
    #[must_use]
    pub const fn extended_frame(self) -> bool {
        self.0 & FTYPE == 0
    }

    /// Armv8-M: the exception was taken to the secure state.
    #[must_use]
    pub const fn secure_exception(self) -> bool {
        self.0 & ES != 0
    }

    /// Armv8-M: the callee registers were stacked as an additional state
    /// context below the basic frame.
    #[must_use]
    pub const fn state_context_stacked(self) -> bool {
        self.0 & DCRS == 0
    }

    /// Armv8-M: the frame lives on a secure stack.
    #[must_use]
    pub const fn secure_stack(self) -> bool {
        self.0 & S != 0
    }
}

/// Which of the optional frame parts are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameLayout {
    /// Additional state context below the basic frame.
    pub state_context: bool,
    /// FP extension above the basic frame.
    pub extended: bool,
}

impl FrameLayout {
    /// Frame shape for `exc_return` on a target with `caps`.
    ///
    /// The DCRS bit only has meaning on Armv8-M; older variants never push an
    /// additional state context.
    #[must_use]
    pub const fn new(exc_return: ExcReturn, caps: Capabilities) -> Self {
        Self {
            state_context: caps.armv8m && exc_return.state_context_stacked(),
            extended: exc_return.extended_frame(),
        }
    }

    /// Total frame size in words, which the bounds check must cover.
    #[must_use]
    pub const fn words(self) -> u32 {
        match (self.state_context, self.extended) {
            (false, false) => BASIC_FRAME_WORDS,
            (true, false) => STATE_CONTEXT_WORDS + BASIC_FRAME_WORDS,
            (false, true) => BASIC_FRAME_WORDS + FP_EXTENSION_WORDS,
            (true, true) => STATE_CONTEXT_WORDS + BASIC_FRAME_WORDS + FP_EXTENSION_WORDS,
        }
    }

    /// Byte offset of the basic frame from the stack pointer.
    #[must_use]
    pub const fn basic_frame_offset(self) -> u32 {
        if self.state_context {
            STATE_CONTEXT_WORDS * 4
        } else {
            0
        }
    }
}
