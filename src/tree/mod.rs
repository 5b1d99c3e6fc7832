// orgtree/src/tree/mod.rs

pub mod types;
pub mod snapshot;
pub mod queries;
pub(crate) mod plan;
pub mod coordinator;
pub mod mutator;
pub mod org_tree;

// Re-export the main OrgTree struct for easier access
pub use org_tree::OrgTree;
pub use queries::TreeQueries;
pub use mutator::TreeMutator;
pub use coordinator::OperationCoordinator;
pub use snapshot::TreeSnapshot;
pub use types::{
    InvariantViolation, MovePosition, OperationKind, OperationReport, SiblingPosition, SiblingSide, WriteOp,
    WritePlan, WriteStep,
};
