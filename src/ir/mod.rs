//! Three-address instruction model and the instruction-lowering collaborator.
//!
//! # Key Components
//!
//! - [`Instruction`] / [`InstKind`] - Three-address instructions with a unique [`InstId`]
//! - [`LocalTable`] - Parameters, declared names, synthetic temporaries and SSA versions
//! - [`InstructionLowering`] - Collaborator turning statements and expressions into instructions
//! - [`TsLowering`] - Default lowering of [`crate::syntax`] trees
//!
//! The graph passes only ask an instruction whether it is a definition, whether it is a control
//! transfer, which local it defines and which locals it uses; everything else about operands is
//! opaque to them.

mod display;
mod instruction;
mod local;
mod lowering;
mod ts;

pub use display::InstructionDisplay;
pub use instruction::{
    Callee, Condition, Constant, InstId, InstKind, Instruction, Marker, Operand, Rvalue,
};
pub use local::{Local, LocalId, LocalKind, LocalTable};
pub use lowering::{InstructionLowering, Lowered, LoweredCondition, LoweringContext};
pub use ts::TsLowering;
