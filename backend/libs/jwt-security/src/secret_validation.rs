//! HS256 signing secret grading
//!
//! A secret is graded on its byte length, its Shannon entropy and the
//! longest run of repeated (`aaaa`) or ascending (`1234`) bytes it contains.

pub const MIN_SECRET_BYTES: usize = 32;
pub const RECOMMENDED_SECRET_BYTES: usize = 64;

const MIN_ENTROPY: f64 = 4.0;
const STRONG_ENTROPY: f64 = 5.0;
const MAX_RUN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStrength {
    /// Refused outside development
    Weak,
    /// Accepted with a warning
    Acceptable,
    Strong,
}

/// Measurements a grade is derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecretProfile {
    pub len: usize,
    /// Bits per byte, 0.0 to 8.0
    pub entropy: f64,
    pub longest_run: usize,
}

impl SecretProfile {
    pub fn of(secret: &str) -> Self {
        let bytes = secret.as_bytes();
        Self {
            len: bytes.len(),
            entropy: entropy(bytes),
            longest_run: longest_run(bytes),
        }
    }

    pub fn strength(&self) -> SecretStrength {
        let weak = self.len < MIN_SECRET_BYTES
            || self.entropy < MIN_ENTROPY
            || self.longest_run > MAX_RUN;

        if weak {
            SecretStrength::Weak
        } else if self.len >= RECOMMENDED_SECRET_BYTES && self.entropy >= STRONG_ENTROPY {
            SecretStrength::Strong
        } else {
            SecretStrength::Acceptable
        }
    }
}

pub fn validate_secret_strength(secret: &str) -> SecretStrength {
    SecretProfile::of(secret).strength()
}

fn entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let mut counts = [0usize; 256];
    for &b in bytes {
        counts[usize::from(b)] += 1;
    }

    let total = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&n| n > 0)
        .map(|&n| {
            let share = n as f64 / total;
            -share * share.log2()
        })
        .sum()
}

/// Longest stretch of equal bytes or of bytes each one above the last
fn longest_run(bytes: &[u8]) -> usize {
    let mut longest = bytes.len().min(1);
    let (mut repeated, mut ascending) = (1, 1);

    for pair in bytes.windows(2) {
        repeated = if pair[1] == pair[0] { repeated + 1 } else { 1 };
        ascending = if pair[0].checked_add(1) == Some(pair[1]) {
            ascending + 1
        } else {
            1
        };
        longest = longest.max(repeated).max(ascending);
    }

    longest
}
