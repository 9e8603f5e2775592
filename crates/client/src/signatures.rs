//! Process-wide cache of Gemini thought signatures.
//!
//! Signatures attest to a reasoning trace and must be echoed back verbatim
//! on subsequent turns of thinking-capable models. They outlive a single
//! request because multi-turn conversations arrive as distinct inbound
//! calls. Two maps are kept: the most recent thinking signature per model
//! family, and one signature per tool-call id.

use crate::registry::ModelFamily;
use std::collections::HashMap;
use std::sync::Mutex;

/// Signatures shorter than this are upstream noise and are discarded.
const MIN_SIGNATURE_LEN: usize = 100;

/// Process-wide signature store. Insertions are idempotent; reads are by
/// key.
#[derive(Debug, Default)]
pub struct SignatureStore {
    by_family: Mutex<HashMap<ModelFamily, String>>,
    by_tool: Mutex<HashMap<String, String>>,
}

impl SignatureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest thinking signature for a model family. Rejects
    /// signatures shorter than 100 characters.
    pub fn record_thinking(&self, family: ModelFamily, signature: &str) {
        if !valid(signature) {
            return;
        }
        self.by_family
            .lock()
            .expect("signature lock")
            .insert(family, signature.to_string());
    }

    /// Record the signature attached to a tool call.
    pub fn record_tool(&self, tool_call_id: &str, signature: &str) {
        if !valid(signature) {
            return;
        }
        self.by_tool
            .lock()
            .expect("signature lock")
            .insert(tool_call_id.to_string(), signature.to_string());
    }

    /// The last thinking signature recorded for a family.
    #[must_use]
    pub fn thinking(&self, family: ModelFamily) -> Option<String> {
        self.by_family
            .lock()
            .expect("signature lock")
            .get(&family)
            .cloned()
    }

    /// The signature recorded for a tool-call id.
    #[must_use]
    pub fn tool(&self, tool_call_id: &str) -> Option<String> {
        self.by_tool
            .lock()
            .expect("signature lock")
            .get(tool_call_id)
            .cloned()
    }

    /// Drop everything. For tests.
    pub fn clear(&self) {
        self.by_family.lock().expect("signature lock").clear();
        self.by_tool.lock().expect("signature lock").clear();
    }
}

fn valid(signature: &str) -> bool {
    signature.len() >= MIN_SIGNATURE_LEN
}
