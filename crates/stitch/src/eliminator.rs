//! Dead chunk elimination
//!
//! Inlining copies a shared chunk's text into its consumers, so once the
//! rewrite stage is done no shared chunk needs its own bundle slot. Consumed
//! and never-imported shared chunks are removed alike; only entries remain.

use indexmap::IndexSet;
use log::{debug, info};

use crate::{bundle::Bundle, classifier::Classification};

/// What the eliminator removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Elimination {
    /// Shared chunks that were inlined into at least one entry
    pub consumed: Vec<String>,
    /// Shared chunks no entry imported
    pub unused: Vec<String>,
}

/// Delete every shared chunk from `bundle`.
///
/// `consumed` names the shared chunks that were injected into some entry; it
/// only affects reporting.
pub fn eliminate_shared_chunks(
    bundle: &mut Bundle,
    classification: &Classification,
    consumed: &IndexSet<String>,
) -> Elimination {
    let mut elimination = Elimination::default();
    for file_name in &classification.shared {
        if bundle.remove(file_name).is_none() {
            continue;
        }
        if consumed.contains(file_name) {
            debug!("Removed inlined shared chunk {file_name}");
            elimination.consumed.push(file_name.clone());
        } else {
            info!("Removed unused shared chunk {file_name}");
            elimination.unused.push(file_name.clone());
        }
    }
    elimination
}
