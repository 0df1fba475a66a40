/// Estimates how many tokens a piece of text will consume upstream.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> u64;
}

/// Rough chars-per-token heuristic (~4 characters per token for Latin
/// scripts). Conservative for the admission estimate; the governor is
/// corrected with the actual count afterwards.
#[derive(Debug, Clone, Copy)]
pub struct CharsPerTokenEstimator {
    chars_per_token: usize,
}

impl CharsPerTokenEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharsPerTokenEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenEstimator for CharsPerTokenEstimator {
    fn estimate(&self, text: &str) -> u64 {
        (text.chars().count() / self.chars_per_token) as u64
    }
}
