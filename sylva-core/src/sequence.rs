//! Alignment position tracking and match-token substitution.
//!
//! Matrix dialects let a sequence repeat the token of the first sequence at
//! the same column by writing a match symbol (commonly `.`). The manager
//! keeps the first sequence's tokens as the substitution source and tracks
//! the current column across token runs, covering both sequential layouts
//! (each sequence appears once) and interleaved layouts (the first sequence
//! reappears to open each block).
//!
//! Substitution assumes interleaved blocks of uniform length per block. A
//! dialect with ragged blocks cannot be aligned this way; readers surface
//! the resulting out-of-range error instead of guessing.

use crate::error::{Error, Result};

/// Tracks column positions across sequence token runs and replaces match
/// tokens with the reference sequence's token at the same column.
#[derive(Debug)]
pub struct MatchTokenManager {
    match_token: Option<String>,
    replace: bool,
    first_name: Option<String>,
    current_name: Option<String>,
    reference: Vec<String>,
    position: usize,
    block_start: usize,
    block_length: usize,
}

impl MatchTokenManager {
    /// A manager substituting `match_token` when `replace` is set; with no
    /// match token (or `replace` unset) runs pass through unchanged.
    pub fn new(match_token: Option<String>, replace: bool) -> Self {
        MatchTokenManager {
            match_token,
            replace,
            first_name: None,
            current_name: None,
            reference: Vec::new(),
            position: 0,
            block_start: 0,
            block_length: 0,
        }
    }

    /// Number of reference tokens collected so far.
    #[inline]
    pub fn reference_len(&self) -> usize {
        self.reference.len()
    }

    /// Process one token run belonging to the sequence called `name`.
    ///
    /// Returns the run with match tokens substituted. Fails when a match
    /// token falls at a column the reference sequence does not cover.
    pub fn process(&mut self, name: &str, tokens: Vec<String>) -> Result<Vec<String>> {
        if self.current_name.as_deref() != Some(name) {
            self.current_name = Some(name.to_string());
            if self.first_name.is_none() {
                self.first_name = Some(name.to_string());
            } else if self.first_name.as_deref() == Some(name) {
                // The reference sequence reappears: a new interleaved block.
                self.block_start += self.block_length;
                self.block_length = 0;
            }
            self.position = self.block_start;
        }

        if self.first_name.as_deref() == Some(name) {
            self.block_length += tokens.len();
            self.position += tokens.len();
            self.reference.extend(tokens.iter().cloned());
            return Ok(tokens);
        }

        let symbol = match (&self.match_token, self.replace) {
            (Some(symbol), true) => symbol.clone(),
            _ => {
                self.position += tokens.len();
                return Ok(tokens);
            }
        };

        let mut out = Vec::with_capacity(tokens.len());
        for token in tokens {
            if token == symbol {
                let replacement = self.reference.get(self.position).ok_or_else(|| {
                    Error::parse(
                        format!(
                            "match token at column {} is beyond the reference sequence \
                             ({} token(s))",
                            self.position + 1,
                            self.reference.len()
                        ),
                        None,
                    )
                })?;
                out.push(replacement.clone());
            } else {
                out.push(token);
            }
            self.position += 1;
        }
        Ok(out)
    }
}
