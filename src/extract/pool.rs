//! Thread-local parser pool.
//!
//! Parser construction is cheap but not free, and the extraction phase
//! runs on a rayon pool; giving each worker thread its own lazily-built
//! parser per language avoids both repeated allocation and lock
//! contention. `RefCell` suffices because the storage is thread-local.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::registry::Language;

thread_local! {
    static PARSERS: RefCell<HashMap<Language, tree_sitter::Parser>> =
        RefCell::new(HashMap::new());
}

/// Execute `f` with this thread's parser for `language`, creating it on
/// first use. The soft parse timeout is applied before every call; a
/// timed-out parse returns `None` from `Parser::parse` and is handled by
/// the caller like any other parse failure.
pub fn with_parser<F, R>(language: Language, timeout: Duration, f: F) -> Result<R>
where
    F: FnOnce(&mut tree_sitter::Parser) -> R,
{
    let grammar = language
        .grammar()
        .ok_or_else(|| anyhow!("no grammar registered for language {language}"))?;

    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        if !parsers.contains_key(&language) {
            let mut parser = tree_sitter::Parser::new();
            parser.set_language(&grammar)?;
            parsers.insert(language, parser);
        }
        let parser = parsers
            .get_mut(&language)
            .ok_or_else(|| anyhow!("parser pool invariant violated for {language}"))?;
        #[allow(deprecated)]
        parser.set_timeout_micros(timeout.as_micros() as u64);
        Ok(f(parser))
    })
}
