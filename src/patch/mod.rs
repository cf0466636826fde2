// Tue Jan 13 2026 - Alex

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod ledger;

pub use descriptor::{ModulePredicate, PatchDescriptor, PatchRule, PatchSpec, PredicateMiss, RuleGate, RuleSpec};
pub use engine::{PatchEngine, PatchOutcome};
pub use error::PatchError;
pub use ledger::{BadPatch, BadPatchKind, LedgerEntry, PatchLedger, RuleRecord};
