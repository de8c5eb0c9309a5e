//! The Integrity Verifier (spec §4.E): given a chain's entries and the
//! public key that should have signed them, checks that the chain starts at
//! sequence 1, has no gaps or duplicates, and that every signature is
//! valid — accumulating every failure found rather than stopping at the
//! first one, so a caller sees the full extent of tampering in one pass.

use egress_log_model::{FunctionId, SignedLogEntry};
use egress_signer::PublicKey;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("chain for {function_id} does not start at sequence 1 (found {found})")]
    DoesNotStartAtOne { function_id: FunctionId, found: u64 },
    #[error("chain for {function_id} has a gap after sequence {after} (next seen: {found})")]
    SequenceGap {
        function_id: FunctionId,
        after: u64,
        found: u64,
    },
    #[error("chain for {function_id} has a duplicate entry at sequence {sequence}")]
    DuplicateSequence { function_id: FunctionId, sequence: u64 },
    #[error("chain for {function_id} has an invalid signature at sequence {sequence}")]
    InvalidSignature { function_id: FunctionId, sequence: u64 },
}

/// Result of verifying one chain. `valid` is `errors.is_empty()`; kept as
/// an explicit field so callers don't need to know that invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub valid: bool,
    pub errors: Vec<IntegrityError>,
}

impl IntegrityReport {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

/// Verifies one `functionId`'s chain. `entries` need not be pre-sorted —
/// this sorts by sequence before checking, so out-of-order storage reads
/// don't themselves register as gaps.
pub fn verify_chain(
    function_id: &FunctionId,
    entries: &[SignedLogEntry],
    public_key: &PublicKey,
) -> IntegrityReport {
    if entries.is_empty() {
        return IntegrityReport::ok();
    }

    let mut sorted: Vec<&SignedLogEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.entry.sequence());

    let mut errors = Vec::new();

    if sorted[0].entry.sequence() != 1 {
        errors.push(IntegrityError::DoesNotStartAtOne {
            function_id: function_id.clone(),
            found: sorted[0].entry.sequence(),
        });
    }

    for pair in sorted.windows(2) {
        let prev = pair[0].entry.sequence();
        let next = pair[1].entry.sequence();
        if next == prev {
            errors.push(IntegrityError::DuplicateSequence {
                function_id: function_id.clone(),
                sequence: next,
            });
        } else if next != prev + 1 {
            errors.push(IntegrityError::SequenceGap {
                function_id: function_id.clone(),
                after: prev,
                found: next,
            });
        }
    }

    for entry in &sorted {
        if public_key.verify(&entry.entry, &entry.signature).is_err() {
            errors.push(IntegrityError::InvalidSignature {
                function_id: function_id.clone(),
                sequence: entry.entry.sequence(),
            });
        }
    }

    IntegrityReport {
        valid: errors.is_empty(),
        errors,
    }
}
