//! CIF file parser.
//!
//! A finite-state machine over the token stream of [`crate::token`]. The
//! parser emits one flat row per data-item declaration and collects errors
//! instead of raising them; the reader entry point decides from the
//! collected severities whether the read aborts.
//!
//! The machine is encoded as an exhaustive `(state, token kind)` match (see
//! [`transition`]); any pair without a listed transition registers an
//! unexpected-token error and leaves the state unchanged. All side effects
//! are scoped to the [`Parser`] struct, so a given token stream always
//! produces the same rows and errors.

pub mod error;
pub mod state;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::token::{Token, TokenKind, Tokenizer};
use error::{ParseError, ParseErrorKind, SeenInfo};
use state::State;

/// CIF dialect controlling data-name splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// CIF 1.1: flat data names; categories are synthesized (the loop id
    /// for loop items, the data name itself for singletons).
    Cif1,
    /// mmCIF: dotted `category.keyword` data names.
    #[default]
    MmCif,
}

/// Case normalization applied to block, frame, category, and keyword names
/// at parser output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseNormalization {
    #[default]
    Lower,
    Upper,
    None,
}

impl CaseNormalization {
    pub fn apply(self, s: &str) -> String {
        match self {
            CaseNormalization::Lower => s.to_lowercase(),
            CaseNormalization::Upper => s.to_uppercase(),
            CaseNormalization::None => s.to_string(),
        }
    }
}

/// One row of the normalized flat table: a single data-item declaration.
///
/// Non-loop items have a single value and `loop_id == 0`; the columns of a
/// loop share a positive `loop_id` and equal-length value lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRow {
    pub block_code: String,
    pub frame_code: Option<String>,
    pub category: String,
    pub keyword: String,
    pub values: Vec<String>,
    pub loop_id: u32,
}

/// Action attached to a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Noop,
    AddItem,
    InitLoop,
    AddLoopName,
    RegisterAndFill,
    FillLoop,
    FinalizeLoop,
}

/// The sparse transition table: `(state, token kind)` to `(action, state)`.
/// Unlisted pairs are error paths. Comments are handled before lookup and
/// never change state.
fn transition(state: State, kind: TokenKind) -> Option<(Action, State)> {
    use Action::*;
    use State::*;
    use TokenKind::*;
    Some(match (state, kind) {
        (InFile, BlockCode) => (Noop, JustInData),
        (JustInData, FrameCode) => (Noop, JustInSave),
        (JustInData, Loop) => (Noop, JustInLoop),
        (JustInData, Name) => (Noop, InName),
        (JustInSave, Loop) => (Noop, JustInSaveLoop),
        (JustInSave, Name) => (Noop, InSaveName),
        (JustInLoop, Name) => (InitLoop, InLoopName),
        (InName, Value) => (AddItem, InData),
        (JustInSaveLoop, Name) => (InitLoop, InSaveLoopName),
        (InSaveName, Value) => (AddItem, InSave),
        (InLoopName, Name) => (AddLoopName, InLoopName),
        (InLoopName, Value) => (RegisterAndFill, InLoopValue),
        (InData, BlockCode) => (Noop, JustInData),
        (InData, FrameCode) => (Noop, JustInSave),
        (InData, Loop) => (Noop, JustInLoop),
        (InData, Name) => (Noop, InName),
        (InSaveLoopName, Name) => (AddLoopName, InSaveLoopName),
        (InSaveLoopName, Value) => (RegisterAndFill, InSaveLoopValue),
        (InSave, FrameEnd) => (Noop, InData),
        (InSave, Loop) => (Noop, JustInSaveLoop),
        (InSave, Name) => (Noop, InSaveName),
        (InLoopValue, BlockCode) => (FinalizeLoop, JustInData),
        (InLoopValue, FrameCode) => (FinalizeLoop, JustInSave),
        (InLoopValue, Loop) => (FinalizeLoop, JustInLoop),
        (InLoopValue, Name) => (FinalizeLoop, InName),
        (InLoopValue, Value) => (FillLoop, InLoopValue),
        (InSaveLoopValue, FrameEnd) => (FinalizeLoop, InData),
        (InSaveLoopValue, Loop) => (FinalizeLoop, JustInSaveLoop),
        (InSaveLoopValue, Name) => (FinalizeLoop, InSaveName),
        (InSaveLoopValue, Value) => (FillLoop, InSaveLoopValue),
        _ => return None,
    })
}

/// Parse `input` into flat rows plus collected errors.
///
/// The input must already be line-ending normalized (the reader entry
/// points take care of this); byte spans in the errors refer to `input`.
pub fn parse(
    input: &str,
    variant: Variant,
    case: CaseNormalization,
) -> (Vec<FlatRow>, Vec<ParseError>) {
    let mut parser = Parser::new(variant, case);
    parser.run(input);
    (parser.rows, parser.errors)
}

/// Parser state: the FSM plus the flat table and error list under
/// construction.
struct Parser {
    variant: Variant,
    case: CaseNormalization,

    state: State,
    token_idx: usize,
    token_kind: TokenKind,
    token_text: String,
    token_start: usize,
    token_end: usize,

    block_code: Option<String>,
    frame_code: Option<String>,
    name_full: Option<String>,
    name_category: Option<String>,
    name_keyword: Option<String>,
    pending_value: Option<String>,

    seen_blocks: HashMap<String, SeenInfo>,
    seen_frames: HashMap<String, SeenInfo>,
    seen_names_block: HashMap<String, SeenInfo>,
    seen_names_frame: HashMap<String, SeenInfo>,

    next_loop_id: u32,
    curr_loop_id: u32,
    loop_rows: Vec<usize>,
    loop_fill: usize,

    rows: Vec<FlatRow>,
    errors: Vec<ParseError>,
}

impl Parser {
    fn new(variant: Variant, case: CaseNormalization) -> Self {
        Self {
            variant,
            case,
            state: State::InFile,
            token_idx: 0,
            token_kind: TokenKind::Bad,
            token_text: String::new(),
            token_start: 0,
            token_end: 0,
            block_code: None,
            frame_code: None,
            name_full: None,
            name_category: None,
            name_keyword: None,
            pending_value: None,
            seen_blocks: HashMap::new(),
            seen_frames: HashMap::new(),
            seen_names_block: HashMap::new(),
            seen_names_frame: HashMap::new(),
            next_loop_id: 0,
            curr_loop_id: 0,
            loop_rows: Vec::new(),
            loop_fill: 0,
            rows: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(&mut self, input: &str) {
        for (idx, token) in Tokenizer::new(input).enumerate() {
            self.token_idx = idx;
            self.token_start = token.start;
            self.token_end = token.end;
            self.token_text = token.text.to_string();

            // Comments preserve state everywhere.
            if token.kind == TokenKind::Comment {
                self.token_kind = token.kind;
                continue;
            }

            let kind = self.process(token);
            self.token_kind = kind;

            match transition(self.state, kind) {
                Some((action, next)) => {
                    self.act(action);
                    self.state = next;
                }
                None => self.wrong_token(kind),
            }
        }

        // EOF policy: a running loop is finalized; any state other than the
        // terminal ones means the file ended early.
        self.token_idx = self.token_idx.saturating_add(1);
        self.token_start = input.len();
        self.token_end = input.len();
        self.token_text.clear();
        match self.state {
            State::InLoopValue | State::InSaveLoopValue => self.finalize_loop(),
            State::InData | State::InSave => {}
            _ => self.register(ParseErrorKind::FileIncomplete, None),
        }
    }

    // Token processors: normalize the token and update the current address
    // before the state transition runs.

    fn process(&mut self, token: Token<'_>) -> TokenKind {
        match token.kind {
            TokenKind::BlockCode => {
                self.process_block_code(token);
                TokenKind::BlockCode
            }
            TokenKind::FrameCode => {
                if token.text.is_empty() {
                    // A bare `save_` is a frame terminator.
                    self.frame_code = None;
                    TokenKind::FrameEnd
                } else {
                    self.process_frame_code(token);
                    TokenKind::FrameCode
                }
            }
            TokenKind::Loop => {
                if !token.text.is_empty() {
                    self.register(ParseErrorKind::LoopNamed, None);
                }
                TokenKind::Loop
            }
            TokenKind::Name => {
                self.process_name(token);
                TokenKind::Name
            }
            TokenKind::Value | TokenKind::ValueQuoted | TokenKind::ValueDoubleQuoted => {
                self.pending_value = Some(token.text.to_string());
                TokenKind::Value
            }
            TokenKind::ValueField => {
                // CIF 1.1 rule 17: leading whitespace in text-field lines is
                // retained, trailing whitespace is elided.
                let processed = token
                    .text
                    .split('\n')
                    .map(str::trim_end)
                    .collect::<Vec<_>>()
                    .join("\n");
                self.pending_value = Some(processed);
                TokenKind::Value
            }
            other => other,
        }
    }

    fn process_block_code(&mut self, token: Token<'_>) {
        if token.text.is_empty() {
            self.register(ParseErrorKind::BlockCodeEmpty, None);
        }
        let code = self.case.apply(token.text);

        self.block_code = Some(code.clone());
        self.frame_code = None;
        self.clear_name();
        self.seen_frames.clear();
        self.seen_names_block.clear();
        self.seen_names_frame.clear();

        let prior = self.seen_blocks.get(&code).copied();
        if prior.is_some() {
            self.register(ParseErrorKind::BlockCodeDuplicate, prior);
        }
        self.seen_blocks.insert(code, self.seen_here());
    }

    fn process_frame_code(&mut self, token: Token<'_>) {
        let code = self
            .case
            .apply(token.text.strip_prefix('_').unwrap_or(token.text));

        self.frame_code = Some(code.clone());
        self.clear_name();
        self.seen_names_frame.clear();

        let prior = self.seen_frames.get(&code).copied();
        if prior.is_some() {
            self.register(ParseErrorKind::FrameCodeDuplicate, prior);
        }
        self.seen_frames.insert(code, self.seen_here());
    }

    fn process_name(&mut self, token: Token<'_>) {
        if token.text.is_empty() {
            self.register(ParseErrorKind::DataNameEmpty, None);
        }
        let full = self.case.apply(token.text);

        if !full.is_empty() {
            let here = self.seen_here();
            let seen = if self.frame_code.is_some() {
                &mut self.seen_names_frame
            } else {
                &mut self.seen_names_block
            };
            let prior = seen.insert(full.clone(), here);
            if prior.is_some() {
                self.name_full = Some(full.clone());
                self.register(ParseErrorKind::DataNameDuplicate, prior);
            }
        }

        match self.variant {
            Variant::MmCif => match full.split_once('.') {
                Some((category, keyword)) if !category.is_empty() && !keyword.is_empty() => {
                    self.name_category = Some(category.to_string());
                    self.name_keyword = Some(keyword.to_string());
                }
                Some((category, _)) => {
                    self.name_full = Some(full.clone());
                    let kind = if category.is_empty() {
                        ParseErrorKind::DataNameMissingCategory
                    } else {
                        ParseErrorKind::DataNameEmpty
                    };
                    self.register(kind, None);
                    self.name_category = Some(full.clone());
                    self.name_keyword = Some(full.clone());
                }
                None => {
                    if !full.is_empty() {
                        self.name_full = Some(full.clone());
                        self.register(ParseErrorKind::DataNameMissingCategory, None);
                    }
                    self.name_category = Some(full.clone());
                    self.name_keyword = Some(full.clone());
                }
            },
            Variant::Cif1 => {
                self.name_category = None;
                self.name_keyword = Some(full.clone());
            }
        }
        self.name_full = Some(full);
    }

    fn clear_name(&mut self) {
        self.name_full = None;
        self.name_category = None;
        self.name_keyword = None;
        self.pending_value = None;
    }

    // State actions.

    fn act(&mut self, action: Action) {
        match action {
            Action::Noop => {}
            Action::AddItem => self.add_item(),
            Action::InitLoop => self.init_loop(),
            Action::AddLoopName => self.add_loop_name(),
            Action::RegisterAndFill => {
                self.loop_fill = 0;
                self.fill_loop_value();
            }
            Action::FillLoop => self.fill_loop_value(),
            Action::FinalizeLoop => self.finalize_loop(),
        }
    }

    fn row_names(&self, loop_id: u32) -> (String, String) {
        let full = self.name_full.clone().unwrap_or_default();
        match self.variant {
            Variant::MmCif => (
                self.name_category.clone().unwrap_or_else(|| full.clone()),
                self.name_keyword.clone().unwrap_or(full),
            ),
            Variant::Cif1 => {
                let category = if loop_id == 0 {
                    full.clone()
                } else {
                    loop_id.to_string()
                };
                (category, full)
            }
        }
    }

    fn push_row(&mut self, values: Vec<String>, loop_id: u32) -> usize {
        let (category, keyword) = self.row_names(loop_id);
        self.rows.push(FlatRow {
            block_code: self.block_code.clone().unwrap_or_default(),
            frame_code: self.frame_code.clone(),
            category,
            keyword,
            values,
            loop_id,
        });
        self.rows.len() - 1
    }

    fn add_item(&mut self) {
        let value = self.pending_value.take().unwrap_or_default();
        self.push_row(vec![value], 0);
    }

    fn init_loop(&mut self) {
        self.next_loop_id += 1;
        self.curr_loop_id = self.next_loop_id;
        self.loop_rows.clear();
        self.loop_fill = 0;
        self.add_loop_name();
    }

    fn add_loop_name(&mut self) {
        let idx = self.push_row(Vec::new(), self.curr_loop_id);
        self.loop_rows.push(idx);
    }

    fn fill_loop_value(&mut self) {
        let columns = self.loop_rows.len();
        if columns == 0 {
            return;
        }
        let value = self.pending_value.take().unwrap_or_default();
        let idx = self.loop_rows[self.loop_fill % columns];
        self.rows[idx].values.push(value);
        self.loop_fill += 1;
    }

    fn finalize_loop(&mut self) {
        let columns = self.loop_rows.len();
        if columns > 0 && self.loop_fill % columns != 0 {
            self.register(ParseErrorKind::TableIncomplete, None);
        }
        self.loop_rows.clear();
        self.loop_fill = 0;
    }

    // Error handling.

    fn wrong_token(&mut self, kind: TokenKind) {
        let error_kind = if kind == TokenKind::Bad {
            ParseErrorKind::TokenBad
        } else if kind.is_reserved() {
            ParseErrorKind::TokenReserved
        } else {
            ParseErrorKind::TokenUnexpected
        };
        self.register(error_kind, None);
    }

    fn seen_here(&self) -> SeenInfo {
        SeenInfo {
            token_idx: self.token_idx,
            start: self.token_start,
            end: self.token_end,
        }
    }

    fn register(&mut self, kind: ParseErrorKind, prior: Option<SeenInfo>) {
        self.errors.push(ParseError {
            kind,
            token_idx: self.token_idx,
            start: self.token_start,
            end: self.token_end,
            state: self.state,
            token_kind: self.token_kind,
            token_text: self.token_text.clone(),
            block_code: self.block_code.clone(),
            frame_code: self.frame_code.clone(),
            data_name: self.name_full.clone(),
            prior,
        });
    }
}
