pub mod reconciler;

pub use reconciler::{NoSubmissionReason, ReconcileOutcome, Reconciler};
