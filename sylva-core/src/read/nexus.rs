//! Nexus reader.
//!
//! A Nexus file is `#NEXUS` followed by `BEGIN <name>; ... END;` blocks.
//! The reader resolves each block name to a handler and each command name
//! to a command reader valid in declared blocks (or in all blocks when none
//! are declared). A command reader is called repeatedly until it reports
//! completion, which lets the `MATRIX` reader deliver one row per call.
//!
//! Block start events are deferred: the block label may arrive via a later
//! `TITLE` command, so the start is emitted the first time a command other
//! than `TITLE` or `LINK` is seen. Comments read before that point buffer
//! in a pushed event collection and replay right after the start event.
//!
//! Unknown commands never abort parsing. They are skipped, or surfaced as
//! [`Event::UnknownCommand`] when
//! [`ParamKey::EmitUnknownCommands`](crate::params::ParamKey) is set.

use std::collections::HashMap;
use std::io::Read;

use tracing::warn;

use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Id, TokenMeaning, TokenSetKind};
use crate::params::ParameterMap;
use crate::read::newick::parse_tree_payload;
use crate::read::text::Cursor;
use crate::read::{for_each_chunk, EventReader};
use crate::sequence::MatchTokenManager;
use crate::state::DocState;

/// Name of the shared table holding `TRANSLATE` bindings. Cleared on the
/// way into and out of every TREES block.
const TRANSLATE_TABLE: &str = "translate";

// ============================================================================
// Lexing helpers
// ============================================================================

fn is_word_byte(byte: u8) -> bool {
    !byte.is_ascii_whitespace()
        && !matches!(
            byte,
            b'=' | b';'
                | b','
                | b':'
                | b'('
                | b')'
                | b'['
                | b']'
                | b'{'
                | b'}'
                | b'<'
                | b'>'
                | b'*'
                | b'/'
                | b'\\'
                | b'\''
                | b'"'
                | b'`'
        )
}

/// Read one Nexus word or quoted token. Unquoted underscores stand for
/// spaces. Returns an empty string at a delimiter.
fn read_word(cursor: &mut Cursor) -> Result<String> {
    if cursor.peek() == Some(b'\'') {
        return cursor.read_quoted(b'\'');
    }
    Ok(cursor.take_while(is_word_byte).replace('_', " "))
}

/// Emit a comment, splitting oversized text into continued chunks.
fn emit_comment(doc: &mut DocState, text: String) {
    for_each_chunk(&text, |chunk, continued| {
        doc.emit(Event::Comment { text: chunk.to_string(), continued });
    });
}

/// Skip whitespace, turning comments into events on the current collection.
fn skip_trivia(cursor: &mut Cursor, doc: &mut DocState) -> Result<()> {
    loop {
        cursor.skip_whitespace();
        if cursor.peek() == Some(b'[') {
            let text = cursor.read_bracketed(true)?;
            emit_comment(doc, text);
        } else {
            return Ok(());
        }
    }
}

/// Consume a command body up to and including `;`, honoring quotes and
/// comments, and return the raw text before the terminator.
fn consume_command_raw(cursor: &mut Cursor) -> Result<String> {
    let start = cursor.location();
    let mut out = String::new();
    loop {
        match cursor.peek() {
            None => {
                return Err(Error::parse_at("end of input inside a command", start))
            }
            Some(b';') => {
                cursor.bump();
                return Ok(out.trim().to_string());
            }
            Some(b'\'') => {
                let quoted = cursor.read_quoted(b'\'')?;
                out.push('\'');
                out.push_str(&quoted.replace('\'', "''"));
                out.push('\'');
            }
            Some(b'[') => {
                let comment = cursor.read_bracketed(true)?;
                out.push('[');
                out.push_str(&comment);
                out.push(']');
            }
            Some(_) => {
                if let Some(c) = cursor.bump_char() {
                    out.push(c);
                }
            }
        }
    }
}

// ============================================================================
// Block handlers
// ============================================================================

struct NexusCtx<'a> {
    cur: &'a mut Cursor,
    doc: &'a mut DocState,
    params: &'a ParameterMap,
    block: &'a mut BlockState,
}

trait BlockHandler: Sync {
    /// Canonical block name, uppercase.
    fn block_type(&self) -> &'static str;

    fn handles(&self, name: &str) -> bool {
        name == self.block_type()
    }

    fn fresh_data(&self) -> BlockData;

    /// The deferred start event for this block.
    fn start_event(&self, block: &BlockState) -> Event;

    fn end_type(&self) -> ContentType;

    fn on_begin(&self, ctx: &mut NexusCtx<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    fn on_end(&self, ctx: &mut NexusCtx<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

struct TaxaHandler;
struct TreesHandler;
struct CharactersHandler;

static BLOCK_HANDLERS: &[&dyn BlockHandler] =
    &[&TaxaHandler, &TreesHandler, &CharactersHandler];

impl BlockHandler for TaxaHandler {
    fn block_type(&self) -> &'static str {
        "TAXA"
    }

    fn fresh_data(&self) -> BlockData {
        BlockData::Taxa { declared: None }
    }

    fn start_event(&self, block: &BlockState) -> Event {
        Event::OtuListStart {
            id: block.id.clone(),
            label: block.title.clone(),
        }
    }

    fn end_type(&self) -> ContentType {
        ContentType::OtuList
    }
}

impl BlockHandler for TreesHandler {
    fn block_type(&self) -> &'static str {
        "TREES"
    }

    fn fresh_data(&self) -> BlockData {
        BlockData::Trees
    }

    fn start_event(&self, block: &BlockState) -> Event {
        Event::TreeGroupStart {
            id: block.id.clone(),
            label: block.title.clone(),
            otu_list: block.linked_otus.clone(),
        }
    }

    fn end_type(&self) -> ContentType {
        ContentType::TreeGroup
    }

    fn on_begin(&self, ctx: &mut NexusCtx<'_>) -> Result<()> {
        ctx.doc.table(TRANSLATE_TABLE).clear();
        Ok(())
    }

    fn on_end(&self, ctx: &mut NexusCtx<'_>) -> Result<()> {
        ctx.doc.table(TRANSLATE_TABLE).clear();
        Ok(())
    }
}

impl BlockHandler for CharactersHandler {
    fn block_type(&self) -> &'static str {
        "CHARACTERS"
    }

    // DATA is CHARACTERS with implied new taxa; both parse the same here.
    fn handles(&self, name: &str) -> bool {
        name == "CHARACTERS" || name == "DATA"
    }

    fn fresh_data(&self) -> BlockData {
        BlockData::Characters(CharState::default())
    }

    fn start_event(&self, block: &BlockState) -> Event {
        Event::AlignmentStart {
            id: block.id.clone(),
            label: block.title.clone(),
            otu_list: block.linked_otus.clone(),
        }
    }

    fn end_type(&self) -> ContentType {
        ContentType::Alignment
    }
}

// ============================================================================
// Block state
// ============================================================================

struct BlockState {
    handler: &'static dyn BlockHandler,
    id: Id,
    title: Option<String>,
    linked_otus: Option<Id>,
    started: bool,
    current: Option<&'static CommandSpec>,
}

enum BlockData {
    Taxa { declared: Option<u64> },
    Trees,
    Characters(CharState),
}

struct CharState {
    ntax: Option<u64>,
    nchar: Option<u64>,
    kind: TokenSetKind,
    gap: Option<char>,
    missing: Option<char>,
    match_char: Option<char>,
    symbols: Vec<String>,
    tokens_mode: bool,
    interleave: bool,
    token_set_emitted: bool,
    matrix: Option<MatrixState>,
}

impl Default for CharState {
    fn default() -> Self {
        CharState {
            ntax: None,
            nchar: None,
            kind: TokenSetKind::Standard,
            gap: None,
            missing: Some('?'),
            match_char: None,
            symbols: Vec::new(),
            tokens_mode: false,
            interleave: false,
            token_set_emitted: false,
            matrix: None,
        }
    }
}

struct MatrixState {
    manager: MatchTokenManager,
    sequence_ids: HashMap<String, Id>,
}

impl BlockState {
    fn new(handler: &'static dyn BlockHandler, id: Id) -> (BlockState, BlockData) {
        (
            BlockState {
                handler,
                id,
                title: None,
                linked_otus: None,
                started: false,
                current: None,
            },
            handler.fresh_data(),
        )
    }
}

/// Emit the deferred block start, replaying any buffered comments after it.
fn ensure_started(ctx: &mut NexusCtx<'_>) {
    if ctx.block.started {
        return;
    }
    ctx.block.started = true;
    let start = ctx.block.handler.start_event(ctx.block);
    let buffered = ctx.doc.pop_collection().unwrap_or_default();
    ctx.doc.emit(start);
    for event in buffered {
        ctx.doc.emit(event);
    }
}

// ============================================================================
// Command readers
// ============================================================================

struct CommandSpec {
    name: &'static str,
    /// Block types this command is valid in; empty means all blocks.
    blocks: &'static [&'static str],
    /// Returns `true` when the command is complete.
    run: fn(&mut NexusCtx<'_>, &mut BlockData) -> Result<bool>,
}

static COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "TITLE", blocks: &[], run: cmd_title },
    CommandSpec { name: "LINK", blocks: &["TREES", "CHARACTERS"], run: cmd_link },
    CommandSpec {
        name: "DIMENSIONS",
        blocks: &["TAXA", "CHARACTERS"],
        run: cmd_dimensions,
    },
    CommandSpec { name: "TAXLABELS", blocks: &["TAXA"], run: cmd_taxlabels },
    CommandSpec { name: "TRANSLATE", blocks: &["TREES"], run: cmd_translate },
    CommandSpec { name: "TREE", blocks: &["TREES"], run: cmd_tree },
    CommandSpec { name: "FORMAT", blocks: &["CHARACTERS"], run: cmd_format },
    CommandSpec { name: "MATRIX", blocks: &["CHARACTERS"], run: cmd_matrix },
];

fn find_command(name: &str, block_type: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name == name && (spec.blocks.is_empty() || spec.blocks.contains(&block_type)))
}

fn cmd_title(ctx: &mut NexusCtx<'_>, _data: &mut BlockData) -> Result<bool> {
    skip_trivia(ctx.cur, ctx.doc)?;
    let location = ctx.cur.location();
    let title = read_word(ctx.cur)?;
    if title.is_empty() {
        return Err(Error::parse_at("TITLE requires a name", location));
    }
    ctx.block.title = Some(title.clone());
    ctx.doc
        .register_block(ctx.block.handler.block_type(), Some(&title), ctx.block.id.clone());
    skip_trivia(ctx.cur, ctx.doc)?;
    ctx.cur.expect(b';')?;
    Ok(true)
}

fn cmd_link(ctx: &mut NexusCtx<'_>, _data: &mut BlockData) -> Result<bool> {
    skip_trivia(ctx.cur, ctx.doc)?;
    let block_type = read_word(ctx.cur)?.to_ascii_uppercase();
    skip_trivia(ctx.cur, ctx.doc)?;
    ctx.cur.expect(b'=')?;
    skip_trivia(ctx.cur, ctx.doc)?;
    let location = ctx.cur.location();
    let title = read_word(ctx.cur)?;
    let target = ctx
        .doc
        .resolve_block(&block_type, Some(&title))
        .cloned()
        .ok_or_else(|| {
            Error::parse_at(
                format!("LINK names the {block_type} block {title:?}, but no such title was declared"),
                location,
            )
        })?;
    if block_type == "TAXA" {
        ctx.block.linked_otus = Some(target);
    }
    skip_trivia(ctx.cur, ctx.doc)?;
    ctx.cur.expect(b';')?;
    Ok(true)
}

fn cmd_dimensions(ctx: &mut NexusCtx<'_>, data: &mut BlockData) -> Result<bool> {
    loop {
        skip_trivia(ctx.cur, ctx.doc)?;
        if ctx.cur.eat(b';') {
            return Ok(true);
        }
        let location = ctx.cur.location();
        let key = read_word(ctx.cur)?.to_ascii_uppercase();
        if key.is_empty() {
            return Err(Error::parse_at("expected a DIMENSIONS subcommand", location));
        }
        skip_trivia(ctx.cur, ctx.doc)?;
        if !ctx.cur.eat(b'=') {
            // Flag subcommand such as NEWTAXA.
            continue;
        }
        skip_trivia(ctx.cur, ctx.doc)?;
        let value = read_word(ctx.cur)?;
        let number = value.parse::<u64>().map_err(|_| {
            Error::parse_at(format!("invalid {key} value {value:?}"), location)
        })?;
        match (&mut *data, key.as_str()) {
            (BlockData::Taxa { declared }, "NTAX") => *declared = Some(number),
            (BlockData::Characters(chars), "NTAX") => chars.ntax = Some(number),
            (BlockData::Characters(chars), "NCHAR") => chars.nchar = Some(number),
            _ => {}
        }
    }
}

fn cmd_taxlabels(ctx: &mut NexusCtx<'_>, data: &mut BlockData) -> Result<bool> {
    let table_name = ctx.block.id.as_str().to_string();
    let mut count = 0u64;
    loop {
        skip_trivia(ctx.cur, ctx.doc)?;
        if ctx.cur.eat(b';') {
            break;
        }
        let location = ctx.cur.location();
        let label = read_word(ctx.cur)?;
        if label.is_empty() {
            return Err(Error::parse_at("expected a taxon label", location));
        }
        let id = ctx.doc.fresh_id();
        ctx.doc.emit(Event::OtuStart { id: id.clone(), label: Some(label.clone()) });
        ctx.doc.emit(Event::End(ContentType::Otu));
        ctx.doc.table(&table_name).push(Some(&label), id);
        count += 1;
    }
    if let BlockData::Taxa { declared: Some(declared) } = data {
        if *declared != count {
            warn!(
                target: "sylva::nexus",
                declared = *declared,
                found = count,
                "TAXLABELS count differs from NTAX"
            );
        }
    }
    Ok(true)
}

fn cmd_translate(ctx: &mut NexusCtx<'_>, _data: &mut BlockData) -> Result<bool> {
    let location = ctx.cur.location();
    let taxa_table = ctx
        .block
        .linked_otus
        .clone()
        .or_else(|| ctx.doc.resolve_block("TAXA", None).cloned())
        .ok_or_else(|| {
            Error::parse_at("TRANSLATE requires a TAXA block", location)
        })?;
    let taxa_table = taxa_table.as_str().to_string();
    loop {
        skip_trivia(ctx.cur, ctx.doc)?;
        if ctx.cur.eat(b';') {
            return Ok(true);
        }
        let location = ctx.cur.location();
        let token = read_word(ctx.cur)?;
        if token.is_empty() {
            return Err(Error::parse_at("expected a TRANSLATE key", location));
        }
        skip_trivia(ctx.cur, ctx.doc)?;
        let name_location = ctx.cur.location();
        let name = read_word(ctx.cur)?;
        if name.is_empty() {
            return Err(Error::parse_at(
                format!("TRANSLATE key {token:?} has no taxon name"),
                name_location,
            ));
        }
        let otu = ctx
            .doc
            .table_ref(&taxa_table)
            .and_then(|table| table.resolve(&name))
            .cloned()
            .ok_or_else(|| {
                Error::parse_at(
                    format!("taxon {name:?} from TRANSLATE is not declared"),
                    name_location,
                )
            })?;
        ctx.doc.table(TRANSLATE_TABLE).alias(&token, otu);
        skip_trivia(ctx.cur, ctx.doc)?;
        ctx.cur.eat(b',');
    }
}

fn cmd_tree(ctx: &mut NexusCtx<'_>, _data: &mut BlockData) -> Result<bool> {
    skip_trivia(ctx.cur, ctx.doc)?;
    ctx.cur.eat(b'*');
    skip_trivia(ctx.cur, ctx.doc)?;
    let location = ctx.cur.location();
    let name = read_word(ctx.cur)?;
    if name.is_empty() {
        return Err(Error::parse_at("TREE requires a name", location));
    }
    skip_trivia(ctx.cur, ctx.doc)?;
    ctx.cur.expect(b'=')?;

    // Rooting hot comments such as [&R] are lexical noise here; everything
    // else before the payload stays a comment event.
    loop {
        ctx.cur.skip_whitespace();
        if ctx.cur.peek() != Some(b'[') {
            break;
        }
        let text = ctx.cur.read_bracketed(true)?;
        if !text.starts_with('&') {
            emit_comment(ctx.doc, text);
        }
    }

    let taxa_table_name = ctx
        .block
        .linked_otus
        .clone()
        .or_else(|| ctx.doc.resolve_block("TAXA", None).cloned())
        .map(|id| id.as_str().to_string());

    let mut payload = Vec::new();
    let network;
    {
        let doc = &mut *ctx.doc;
        let tables = &doc.tables;
        let taxa = taxa_table_name.as_deref().and_then(|name| tables.get(name));
        let translate = tables.get(TRANSLATE_TABLE);
        let translate_internals = ctx.params.translate_node_labels();
        let mut resolve = |token: &str, is_leaf: bool| -> Option<(Id, Option<String>)> {
            if !is_leaf && !translate_internals {
                return None;
            }
            if let Some(id) = translate.and_then(|table| table.by_key(token)) {
                let display = taxa
                    .and_then(|table| table.label_of(id))
                    .map(str::to_string);
                return Some((id.clone(), display));
            }
            let taxa = taxa?;
            if let Some(id) = taxa.by_key(token) {
                return Some((id.clone(), None));
            }
            let index: usize = token.parse().ok()?;
            let id = taxa.by_index(index)?;
            let display = taxa.label_of(id).map(str::to_string);
            Some((id.clone(), display))
        };
        network = parse_tree_payload(
            ctx.cur,
            &mut doc.ids,
            ctx.params.extended_newick(),
            &mut resolve,
            &mut payload,
        )?;
    }

    let id = ctx.doc.fresh_id();
    if network {
        ctx.doc.emit(Event::NetworkStart { id, label: Some(name) });
    } else {
        ctx.doc.emit(Event::TreeStart { id, label: Some(name) });
    }
    for event in payload {
        ctx.doc.emit(event);
    }
    ctx.doc.emit(Event::End(if network {
        ContentType::Network
    } else {
        ContentType::Tree
    }));
    Ok(true)
}

fn cmd_format(ctx: &mut NexusCtx<'_>, data: &mut BlockData) -> Result<bool> {
    let chars = match data {
        BlockData::Characters(chars) => chars,
        _ => return Err(Error::parse("FORMAT outside a CHARACTERS block", None)),
    };
    loop {
        skip_trivia(ctx.cur, ctx.doc)?;
        if ctx.cur.eat(b';') {
            break;
        }
        let location = ctx.cur.location();
        let key = read_word(ctx.cur)?.to_ascii_uppercase();
        if key.is_empty() {
            return Err(Error::parse_at("expected a FORMAT subcommand", location));
        }
        skip_trivia(ctx.cur, ctx.doc)?;
        if !ctx.cur.eat(b'=') {
            match key.as_str() {
                "TOKENS" => chars.tokens_mode = true,
                "NOTOKENS" => chars.tokens_mode = false,
                "INTERLEAVE" => chars.interleave = true,
                "TRANSPOSE" => {
                    return Err(Error::unsupported(
                        "transposed matrices are not supported",
                        Some(location),
                    ))
                }
                _ => {}
            }
            continue;
        }
        skip_trivia(ctx.cur, ctx.doc)?;
        let value = match ctx.cur.peek() {
            Some(b'"') => ctx.cur.read_quoted(b'"')?,
            _ => read_word(ctx.cur)?,
        };
        match key.as_str() {
            "DATATYPE" => {
                chars.kind = match value.to_ascii_uppercase().as_str() {
                    "DNA" | "NUCLEOTIDE" => TokenSetKind::Dna,
                    "RNA" => TokenSetKind::Rna,
                    "PROTEIN" => TokenSetKind::Protein,
                    "STANDARD" => TokenSetKind::Standard,
                    "CONTINUOUS" => TokenSetKind::Continuous,
                    _ => TokenSetKind::Unknown,
                }
            }
            "GAP" => chars.gap = value.chars().next(),
            "MISSING" => chars.missing = value.chars().next(),
            "MATCHCHAR" => chars.match_char = value.chars().next(),
            "SYMBOLS" => {
                chars.symbols = if value.contains(char::is_whitespace) {
                    value.split_whitespace().map(str::to_string).collect()
                } else {
                    value.chars().map(|c| c.to_string()).collect()
                }
            }
            "INTERLEAVE" => chars.interleave = value.eq_ignore_ascii_case("yes"),
            _ => {}
        }
    }
    emit_token_set(ctx.doc, chars);
    Ok(true)
}

/// Emit the token set declared by FORMAT (or the Nexus defaults).
fn emit_token_set(doc: &mut DocState, chars: &mut CharState) {
    if chars.token_set_emitted {
        return;
    }
    chars.token_set_emitted = true;
    let id = doc.fresh_id();
    doc.emit(Event::TokenSetDefinitionStart { id, kind: chars.kind, label: None });
    let mut definitions: Vec<(String, TokenMeaning)> = Vec::new();
    for symbol in &chars.symbols {
        definitions.push((symbol.clone(), TokenMeaning::CharacterState));
    }
    if let Some(gap) = chars.gap {
        definitions.push((gap.to_string(), TokenMeaning::Gap));
    }
    if let Some(missing) = chars.missing {
        definitions.push((missing.to_string(), TokenMeaning::Missing));
    }
    if let Some(match_char) = chars.match_char {
        definitions.push((match_char.to_string(), TokenMeaning::Match));
    }
    for (token, meaning) in definitions {
        let id = doc.fresh_id();
        doc.emit(Event::TokenDefinition { id, token, meaning });
    }
    doc.emit(Event::End(ContentType::TokenSetDefinition));
}

fn cmd_matrix(ctx: &mut NexusCtx<'_>, data: &mut BlockData) -> Result<bool> {
    let chars = match data {
        BlockData::Characters(chars) => chars,
        _ => return Err(Error::parse("MATRIX outside a CHARACTERS block", None)),
    };
    if chars.matrix.is_none() {
        emit_token_set(ctx.doc, chars);
        let match_token = chars
            .match_char
            .map(|c| c.to_string())
            .or_else(|| ctx.params.match_token().map(str::to_string));
        chars.matrix = Some(MatrixState {
            manager: MatchTokenManager::new(match_token, ctx.params.replace_match_tokens()),
            sequence_ids: HashMap::new(),
        });
    }

    skip_trivia(ctx.cur, ctx.doc)?;
    if ctx.cur.eat(b';') {
        if let (Some(ntax), Some(matrix)) = (chars.ntax, &chars.matrix) {
            if matrix.sequence_ids.len() as u64 != ntax {
                warn!(
                    target: "sylva::nexus",
                    declared = ntax,
                    found = matrix.sequence_ids.len(),
                    "MATRIX row count differs from NTAX"
                );
            }
        }
        return Ok(true);
    }
    if ctx.cur.is_eof() {
        return Err(Error::parse_at("end of input inside MATRIX", ctx.cur.location()));
    }

    let location = ctx.cur.location();
    let name = read_word(ctx.cur)?;
    if name.is_empty() {
        return Err(Error::parse_at("expected a sequence name", location));
    }

    let single_char = chars.kind.single_char_tokens() && !chars.tokens_mode;
    let limit = if chars.interleave {
        None
    } else {
        chars.nchar.map(|n| n as usize)
    };
    let tokens = read_row_tokens(ctx.cur, ctx.doc, single_char, limit)?;

    let matrix = match chars.matrix.as_mut() {
        Some(matrix) => matrix,
        None => return Err(Error::parse("matrix state missing", None)),
    };
    let tokens = matrix
        .manager
        .process(&name, tokens)
        .map_err(|err| err.with_location(location))?;

    let taxa_table_name = ctx
        .block
        .linked_otus
        .clone()
        .or_else(|| ctx.doc.resolve_block("TAXA", None).cloned())
        .map(|id| id.as_str().to_string());
    let otu = taxa_table_name
        .as_deref()
        .and_then(|table| ctx.doc.table_ref(table))
        .and_then(|table| table.by_key(&name))
        .cloned();

    let id = match matrix.sequence_ids.get(&name) {
        Some(id) => id.clone(),
        None => {
            let id = ctx.doc.fresh_id();
            matrix.sequence_ids.insert(name.clone(), id.clone());
            id
        }
    };

    ctx.doc.emit(Event::SequenceStart {
        id,
        label: Some(name),
        otu,
    });
    ctx.doc.emit(Event::SequenceTokens { tokens });
    ctx.doc.emit(Event::End(ContentType::Sequence));
    Ok(false)
}

/// Read the tokens of one matrix row.
///
/// Without a column limit the row ends at the line break; with one (a known
/// `NCHAR` in a sequential matrix) it ends when the count is reached.
fn read_row_tokens(
    cursor: &mut Cursor,
    doc: &mut DocState,
    single_char: bool,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    loop {
        if let Some(limit) = limit {
            if tokens.len() >= limit {
                return Ok(tokens);
            }
        }
        match cursor.peek() {
            None | Some(b';') => return Ok(tokens),
            Some(b'\n') => {
                if limit.is_none() {
                    cursor.bump();
                    return Ok(tokens);
                }
                cursor.bump();
            }
            Some(b'[') => {
                let text = cursor.read_bracketed(true)?;
                emit_comment(doc, text);
            }
            Some(b'(') | Some(b'{') => {
                tokens.push(read_compound_token(cursor)?);
            }
            Some(b'\'') => {
                tokens.push(cursor.read_quoted(b'\'')?);
            }
            Some(b) if b.is_ascii_whitespace() => {
                cursor.bump();
            }
            Some(_) => {
                if single_char {
                    if let Some(c) = cursor.bump_char() {
                        tokens.push(c.to_string());
                    }
                } else {
                    let word = cursor.take_while(|b| {
                        !b.is_ascii_whitespace()
                            && !matches!(b, b';' | b'[' | b'(' | b'{' | b'\'')
                    });
                    if word.is_empty() {
                        return Err(Error::parse_at(
                            "unexpected character in matrix row",
                            cursor.location(),
                        ));
                    }
                    tokens.push(word);
                }
            }
        }
    }
}

/// Read a `(..)` or `{..}` multi-state token as one token string.
fn read_compound_token(cursor: &mut Cursor) -> Result<String> {
    let start = cursor.location();
    let open = match cursor.bump() {
        Some(b) => b,
        None => return Err(Error::parse_at("unexpected end of input", start)),
    };
    let close = if open == b'(' { b')' } else { b'}' };
    let mut out = String::new();
    out.push(open as char);
    loop {
        match cursor.bump_char() {
            None => {
                return Err(Error::parse_at("unterminated multi-state token", start))
            }
            Some(c) if c == close as char => {
                out.push(c);
                return Ok(out);
            }
            Some(c) => out.push(c),
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

enum Status {
    Header,
    TopLevel,
    InBlock(BlockState, BlockData),
    /// Inside an unrecognized block, consuming commands until END.
    SkipBlock,
    Done,
}

/// Pull reader over a Nexus file.
pub struct NexusReader {
    cursor: Cursor,
    doc: DocState,
    params: ParameterMap,
    status: Status,
}

impl NexusReader {
    pub fn new(reader: impl Read, params: ParameterMap) -> Result<Self> {
        Ok(NexusReader {
            cursor: Cursor::from_reader(reader)?,
            doc: DocState::new(),
            params,
            status: Status::Header,
        })
    }

    pub fn from_text(text: impl Into<String>, params: ParameterMap) -> Self {
        NexusReader {
            cursor: Cursor::new(text),
            doc: DocState::new(),
            params,
            status: Status::Header,
        }
    }

    fn fill(&mut self) -> Result<()> {
        while !self.doc.has_pending() {
            if matches!(self.status, Status::Done) {
                break;
            }
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        let next = match &mut self.status {
            Status::Header => {
                self.cursor.skip_whitespace();
                if !self.cursor.eat_ci("#NEXUS") {
                    return Err(Error::parse_at(
                        "input does not start with #NEXUS",
                        self.cursor.location(),
                    ));
                }
                self.doc.emit(Event::DocumentStart);
                Some(Status::TopLevel)
            }
            Status::TopLevel => {
                skip_trivia(&mut self.cursor, &mut self.doc)?;
                if self.cursor.is_eof() {
                    self.doc.emit(Event::End(ContentType::Document));
                    Some(Status::Done)
                } else {
                    let location = self.cursor.location();
                    let word = read_word(&mut self.cursor)?;
                    if !word.eq_ignore_ascii_case("BEGIN") {
                        return Err(Error::parse_at(
                            format!("expected BEGIN, found {word:?}"),
                            location,
                        ));
                    }
                    skip_trivia(&mut self.cursor, &mut self.doc)?;
                    let name_location = self.cursor.location();
                    let name = read_word(&mut self.cursor)?.to_ascii_uppercase();
                    if name.is_empty() {
                        return Err(Error::parse_at("BEGIN requires a block name", name_location));
                    }
                    skip_trivia(&mut self.cursor, &mut self.doc)?;
                    self.cursor.expect(b';')?;
                    match BLOCK_HANDLERS.iter().find(|h| h.handles(&name)) {
                        Some(handler) => {
                            let id = self.doc.fresh_id();
                            self.doc
                                .register_block(handler.block_type(), None, id.clone());
                            let (mut state, data) = BlockState::new(*handler, id);
                            let handler = state.handler;
                            {
                                let mut ctx = NexusCtx {
                                    cur: &mut self.cursor,
                                    doc: &mut self.doc,
                                    params: &self.params,
                                    block: &mut state,
                                };
                                handler.on_begin(&mut ctx)?;
                            }
                            self.doc.push_collection();
                            Some(Status::InBlock(state, data))
                        }
                        None => {
                            warn!(target: "sylva::nexus", block = %name, "skipping unknown block");
                            Some(Status::SkipBlock)
                        }
                    }
                }
            }
            Status::InBlock(state, data) => {
                let mut ctx = NexusCtx {
                    cur: &mut self.cursor,
                    doc: &mut self.doc,
                    params: &self.params,
                    block: state,
                };
                Self::step_block(&mut ctx, data)?
            }
            Status::SkipBlock => {
                skip_trivia(&mut self.cursor, &mut self.doc)?;
                if self.cursor.is_eof() {
                    return Err(Error::parse_at(
                        "end of input inside a block",
                        self.cursor.location(),
                    ));
                }
                let name = read_word(&mut self.cursor)?.to_ascii_uppercase();
                if name == "END" || name == "ENDBLOCK" {
                    skip_trivia(&mut self.cursor, &mut self.doc)?;
                    self.cursor.expect(b';')?;
                    Some(Status::TopLevel)
                } else {
                    let content = consume_command_raw(&mut self.cursor)?;
                    if self.params.emit_unknown_commands() {
                        self.doc.emit(Event::UnknownCommand { name, content });
                    }
                    None
                }
            }
            Status::Done => None,
        };
        if let Some(next) = next {
            self.status = next;
        }
        Ok(())
    }

    /// One step inside a known block: either resume the open command or
    /// dispatch the next command name.
    fn step_block(ctx: &mut NexusCtx<'_>, data: &mut BlockData) -> Result<Option<Status>> {
        if let Some(spec) = ctx.block.current {
            if (spec.run)(ctx, data)? {
                ctx.block.current = None;
            }
            return Ok(None);
        }

        skip_trivia(ctx.cur, ctx.doc)?;
        if ctx.cur.is_eof() {
            return Err(Error::parse_at(
                format!("end of input inside {} block", ctx.block.handler.block_type()),
                ctx.cur.location(),
            ));
        }
        let name = read_word(ctx.cur)?.to_ascii_uppercase();
        if name.is_empty() {
            return Err(Error::parse_at(
                "expected a command name",
                ctx.cur.location(),
            ));
        }

        if name == "END" || name == "ENDBLOCK" {
            skip_trivia(ctx.cur, ctx.doc)?;
            ctx.cur.expect(b';')?;
            ensure_started(ctx);
            let handler = ctx.block.handler;
            handler.on_end(ctx)?;
            ctx.doc.emit(Event::End(handler.end_type()));
            return Ok(Some(Status::TopLevel));
        }

        match find_command(&name, ctx.block.handler.block_type()) {
            Some(spec) => {
                if name != "TITLE" && name != "LINK" {
                    ensure_started(ctx);
                }
                if !(spec.run)(ctx, data)? {
                    ctx.block.current = Some(spec);
                }
            }
            None => {
                ensure_started(ctx);
                let content = consume_command_raw(ctx.cur)?;
                if ctx.params.emit_unknown_commands() {
                    ctx.doc.emit(Event::UnknownCommand { name, content });
                }
            }
        }
        Ok(None)
    }
}

impl EventReader for NexusReader {
    fn next_event(&mut self) -> Result<Option<Event>> {
        self.fill()?;
        Ok(self.doc.take_next())
    }

    fn peek_event(&mut self) -> Result<Option<&Event>> {
        self.fill()?;
        Ok(self.doc.peek_front())
    }
}
