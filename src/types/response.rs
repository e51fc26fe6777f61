//! Upstream completion results as the ledger needs them.

use serde::{Deserialize, Serialize};

/// Token usage reported by the upstream provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens consumed
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens generated
    #[serde(default)]
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens used (input + output)
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A successful, usage-bearing completion from the upstream provider.
///
/// This is everything the orchestrator needs back: the generated text and
/// the unit counts the cost model prices.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text, concatenated across content blocks
    pub text: String,
    /// Token counts for pricing
    pub usage: Usage,
}
