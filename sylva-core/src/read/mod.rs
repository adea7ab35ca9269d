//! Dialect readers producing the unified event stream.
//!
//! Every reader pulls: one [`EventReader::next_event`] call performs exactly
//! the input work needed to materialize one event. Readers share the
//! [`DocState`](crate::state::DocState) bookkeeping and differ only in their
//! token rules and dispatch tables.

pub mod fasta;
pub mod newick;
pub mod nexml;
pub mod nexus;
pub mod phylip;
pub mod text;

use crate::error::Result;
use crate::event::Event;

pub use fasta::FastaReader;
pub use newick::NewickReader;
pub use nexml::NexmlReader;
pub use nexus::NexusReader;
pub use phylip::PhylipReader;

/// Comments and literal text longer than this are split into continued
/// chunks.
pub(crate) const TEXT_CHUNK: usize = 4096;

/// Call `f` once per chunk of `text`, flagging every chunk except the last
/// as continued. Chunks break at char boundaries at or below [`TEXT_CHUNK`].
pub(crate) fn for_each_chunk(text: &str, mut f: impl FnMut(&str, bool)) {
    if text.len() <= TEXT_CHUNK {
        f(text, false);
        return;
    }
    let mut rest = text;
    while rest.len() > TEXT_CHUNK {
        let mut cut = TEXT_CHUNK;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        f(&rest[..cut], true);
        rest = &rest[cut..];
    }
    f(rest, false);
}

/// Pull interface over one document.
///
/// `next_event` returns `Ok(None)` once the document end has been
/// delivered; further calls keep returning `Ok(None)`. Truncated input
/// surfaces as a located parse error, never as a silent early `None`.
pub trait EventReader {
    fn next_event(&mut self) -> Result<Option<Event>>;

    /// One-event lookahead without consuming.
    fn peek_event(&mut self) -> Result<Option<&Event>>;
}
