//! The five built-in actions (spec §4.4, §4.6-§4.8): VARIABLES, PRINT,
//! EVALUATE, FOR, PARALLEL.
mod evaluate;
mod for_loop;
mod parallel;
mod print;
mod variables;

pub use evaluate::EvaluateAction;
pub use for_loop::ForAction;
pub use parallel::ParallelAction;
pub use print::PrintAction;
pub use variables::VariablesAction;

use crate::registry::ActionRegistryBuilder;

/// Register every built-in action. The binary's registry is built from this
/// plus whatever extra actions it wants to add before `freeze()`.
pub fn register_builtins(builder: ActionRegistryBuilder) -> ActionRegistryBuilder {
    builder
        .register(VariablesAction)
        .register(PrintAction)
        .register(EvaluateAction)
        .register(ForAction)
        .register(ParallelAction)
}
