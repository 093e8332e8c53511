//! Raw (unresolved) parse structures and winnow combinators for the text
//! format.
//!
//! Stage 1 of the parser: text → `Raw*` structs. Names of values, blocks and
//! symbols are kept as written; [`super`] resolves them into IR.

use winnow::ascii;
use winnow::combinator::{alt, delimited, opt, preceded, separated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

#[derive(Debug, Clone)]
pub(crate) struct RawOperation<'a> {
    pub results: Vec<&'a str>,
    pub dialect: &'a str,
    pub op_name: &'a str,
    /// Symbol written right after the operation name: `func.func @main`.
    pub sym_name: Option<String>,
    /// Function-style parameters `(%a: type, ...)`. `Some(vec![])` for `()`.
    pub func_params: Option<Vec<(&'a str, RawType<'a>)>>,
    /// `-> type` or `-> (type, ...)`.
    pub return_types: Option<Vec<RawType<'a>>>,
    pub operands: Vec<&'a str>,
    pub attributes: Vec<(&'a str, RawAttribute<'a>)>,
    pub result_types: Vec<RawType<'a>>,
    pub regions: Vec<RawRegion<'a>>,
}

impl RawOperation<'_> {
    pub fn has_signature(&self) -> bool {
        self.func_params.is_some() || self.return_types.is_some()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RawRegion<'a> {
    pub blocks: Vec<RawBlock<'a>>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawBlock<'a> {
    /// `None` for an entry block written without a label.
    pub label: Option<&'a str>,
    pub args: Vec<(&'a str, RawType<'a>)>,
    pub ops: Vec<RawOperation<'a>>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawType<'a> {
    pub dialect: &'a str,
    pub name: &'a str,
    pub params: Vec<RawType<'a>>,
    pub attrs: Vec<(&'a str, RawAttribute<'a>)>,
}

#[derive(Debug, Clone)]
pub(crate) enum RawAttribute<'a> {
    Bool(bool),
    Int(u64),
    Float(f64),
    String(String),
    Symbol(String),
    Type(RawType<'a>),
    List(Vec<RawAttribute<'a>>),
    Unit,
}

fn backtrack<T>() -> ModalResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

// ============================================================================
// Lexical pieces
// ============================================================================

/// Skip whitespace, newlines included.
pub(crate) fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

/// Skip spaces and tabs only. Operands and signatures must stay on the line
/// of their operation.
fn hspace(input: &mut &str) -> ModalResult<()> {
    take_while(0.., [' ', '\t']).void().parse_next(input)
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`
pub(crate) fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

fn name_chars<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

/// `%name`, returns the name without `%`.
pub(crate) fn value_ref<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded('%', name_chars).parse_next(input)
}

/// `^name`, returns the name without `^`.
pub(crate) fn block_label<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded('^', name_chars).parse_next(input)
}

/// `@name` or `@"quoted name"` (same escapes as string literals).
pub(crate) fn symbol_ref(input: &mut &str) -> ModalResult<String> {
    '@'.parse_next(input)?;
    if input.starts_with('"') {
        string_lit.parse_next(input)
    } else {
        name_chars.map(str::to_owned).parse_next(input)
    }
}

/// `dialect.name`
pub(crate) fn qualified_name<'a>(input: &mut &'a str) -> ModalResult<(&'a str, &'a str)> {
    (ident, '.', ident)
        .map(|(d, _, n)| (d, n))
        .parse_next(input)
}

/// Decimal integer; a leading `-` stores the two's complement bits.
pub(crate) fn integer_lit(input: &mut &str) -> ModalResult<u64> {
    let negative = opt('-').parse_next(input)?.is_some();
    let magnitude: u64 = ascii::dec_uint(input)?;
    if !negative {
        return Ok(magnitude);
    }
    let i64_min_magnitude = i64::MAX as u64 + 1;
    match magnitude.cmp(&i64_min_magnitude) {
        std::cmp::Ordering::Greater => backtrack(),
        std::cmp::Ordering::Equal => Ok(i64::MIN as u64),
        std::cmp::Ordering::Less => Ok(-(magnitude as i64) as u64),
    }
}

/// Float literal with a mandatory decimal point, so `42` stays an integer.
pub(crate) fn float_with_dot(input: &mut &str) -> ModalResult<f64> {
    let text = (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit()),
        '.',
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt((
            one_of(['e', 'E']),
            opt(one_of(['+', '-'])),
            take_while(1.., |c: char| c.is_ascii_digit()),
        )),
    )
        .take()
        .parse_next(input)?;
    text.parse::<f64>().or_else(|_| backtrack())
}

/// `"content"` with `\\`, `\"`, `\n`, `\t`, `\r`, `\0` and `\xNN` escapes.
pub(crate) fn string_lit(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut result = String::new();
    loop {
        match any.parse_next(input)? {
            '"' => break,
            '\\' => match any.parse_next(input)? {
                '"' => result.push('"'),
                '\\' => result.push('\\'),
                'n' => result.push('\n'),
                't' => result.push('\t'),
                'r' => result.push('\r'),
                '0' => result.push('\0'),
                'x' => {
                    let hex = take_while(2, |c: char| c.is_ascii_hexdigit()).parse_next(input)?;
                    let code = u8::from_str_radix(hex, 16).or_else(|_| backtrack())?;
                    result.push(char::from(code));
                }
                other => {
                    result.push('\\');
                    result.push(other);
                }
            },
            c => result.push(c),
        }
    }
    Ok(result)
}

// ============================================================================
// Types and attributes
// ============================================================================

/// `dialect.name`, `dialect.name(params)` or `dialect.name(params) {attrs}`.
///
/// The attribute dict is only tried after explicit parentheses, so a type
/// followed by a region body stays unambiguous.
pub(crate) fn raw_type<'a>(input: &mut &'a str) -> ModalResult<RawType<'a>> {
    let (dialect, name) = qualified_name.parse_next(input)?;
    let params: Option<Vec<RawType<'a>>> = opt(delimited(
        ('(', ws),
        separated(0.., (ws, raw_type, ws).map(|(_, t, _)| t), ','),
        (ws, ')'),
    ))
    .parse_next(input)?;
    let attrs = match params {
        Some(_) => opt(preceded(hspace, raw_attr_dict))
            .parse_next(input)?
            .unwrap_or_default(),
        None => Vec::new(),
    };
    Ok(RawType {
        dialect,
        name,
        params: params.unwrap_or_default(),
        attrs,
    })
}

pub(crate) fn raw_attr_value<'a>(input: &mut &'a str) -> ModalResult<RawAttribute<'a>> {
    alt((
        "true".value(RawAttribute::Bool(true)),
        "false".value(RawAttribute::Bool(false)),
        "unit".value(RawAttribute::Unit),
        string_lit.map(RawAttribute::String),
        symbol_ref.map(RawAttribute::Symbol),
        delimited(
            ('[', ws),
            separated(0.., (ws, raw_attr_value, ws).map(|(_, a, _)| a), ','),
            (ws, ']'),
        )
        .map(RawAttribute::List),
        float_with_dot.map(RawAttribute::Float),
        integer_lit.map(RawAttribute::Int),
        raw_type.map(RawAttribute::Type),
    ))
    .parse_next(input)
}

/// `{key = value, ...}` with at least one entry; `{}` is an empty region.
pub(crate) fn raw_attr_dict<'a>(
    input: &mut &'a str,
) -> ModalResult<Vec<(&'a str, RawAttribute<'a>)>> {
    delimited(
        ('{', ws),
        separated(
            1..,
            (ws, ident, ws, '=', ws, raw_attr_value, ws).map(|(_, k, _, _, _, v, _)| (k, v)),
            ',',
        ),
        (ws, '}'),
    )
    .parse_next(input)
}

// ============================================================================
// Operations
// ============================================================================

/// `%0 =` or `%0, %1 =`
fn result_list<'a>(input: &mut &'a str) -> ModalResult<Vec<&'a str>> {
    let results: Vec<&str> =
        separated(1.., (ws, value_ref, ws).map(|(_, v, _)| v), ',').parse_next(input)?;
    '='.parse_next(input)?;
    Ok(results)
}

/// `%a, %b`
fn operand_list<'a>(input: &mut &'a str) -> ModalResult<Vec<&'a str>> {
    separated(1.., (hspace, value_ref, hspace).map(|(_, v, _)| v), ',').parse_next(input)
}

/// `(%a: type, ...)`
fn typed_args<'a>(input: &mut &'a str) -> ModalResult<Vec<(&'a str, RawType<'a>)>> {
    delimited(
        ('(', ws),
        separated(
            0..,
            (ws, value_ref, ws, ':', ws, raw_type, ws).map(|(_, name, _, _, _, ty, _)| (name, ty)),
            ',',
        ),
        (ws, ')'),
    )
    .parse_next(input)
}

/// `-> type` or `-> (type, ...)`
fn return_types<'a>(input: &mut &'a str) -> ModalResult<Vec<RawType<'a>>> {
    preceded(
        (hspace, "->", ws),
        alt((
            delimited(
                ('(', ws),
                separated(0.., (ws, raw_type, ws).map(|(_, t, _)| t), ','),
                (ws, ')'),
            ),
            raw_type.map(|t| vec![t]),
        )),
    )
    .parse_next(input)
}

/// `: type1, type2`
fn type_annotation<'a>(input: &mut &'a str) -> ModalResult<Vec<RawType<'a>>> {
    preceded(
        (hspace, ':', hspace),
        separated(1.., (hspace, raw_type, hspace).map(|(_, t, _)| t), ','),
    )
    .parse_next(input)
}

/// Parse a single operation.
///
/// ```text
/// [results =] dialect.op [@symbol] [(%arg: type, ...) | operands]
///   [-> types] [[attributes] {attrs}] [: types] [regions]
/// ```
pub(crate) fn raw_operation<'a>(input: &mut &'a str) -> ModalResult<RawOperation<'a>> {
    ws.parse_next(input)?;
    let results = opt(result_list).parse_next(input)?.unwrap_or_default();
    ws.parse_next(input)?;

    let (dialect, op_name) = qualified_name.parse_next(input)?;
    let sym_name = opt(preceded(hspace, symbol_ref)).parse_next(input)?;

    hspace.parse_next(input)?;
    let mut func_params = None;
    let mut operands = Vec::new();
    if input.starts_with('(') {
        func_params = Some(typed_args.parse_next(input)?);
    } else if input.starts_with('%') {
        operands = operand_list.parse_next(input)?;
    }

    let return_types = opt(return_types).parse_next(input)?;

    let attributes = opt(preceded(
        (hspace, opt(("attributes", hspace))),
        raw_attr_dict,
    ))
    .parse_next(input)?
    .unwrap_or_default();

    let result_types = opt(type_annotation).parse_next(input)?.unwrap_or_default();

    let mut regions = Vec::new();
    loop {
        hspace.parse_next(input)?;
        if input.starts_with('{') {
            regions.push(raw_region.parse_next(input)?);
        } else {
            break;
        }
    }

    Ok(RawOperation {
        results,
        dialect,
        op_name,
        sym_name,
        func_params,
        return_types,
        operands,
        attributes,
        result_types,
        regions,
    })
}

/// Operations up to the next block label or the end of the region.
fn block_ops<'a>(input: &mut &'a str) -> ModalResult<Vec<RawOperation<'a>>> {
    let mut ops = Vec::new();
    loop {
        ws.parse_next(input)?;
        if input.is_empty() || input.starts_with(['^', '}']) {
            return Ok(ops);
        }
        ops.push(raw_operation.parse_next(input)?);
    }
}

/// `^label(args): ops...`
pub(crate) fn raw_block<'a>(input: &mut &'a str) -> ModalResult<RawBlock<'a>> {
    ws.parse_next(input)?;
    let label = block_label.parse_next(input)?;
    let args = opt(typed_args).parse_next(input)?.unwrap_or_default();
    (ws, ':').parse_next(input)?;
    let ops = block_ops.parse_next(input)?;
    Ok(RawBlock {
        label: Some(label),
        args,
        ops,
    })
}

/// `{ ops... ^bb1: ops... }`. The entry block may omit its label.
pub(crate) fn raw_region<'a>(input: &mut &'a str) -> ModalResult<RawRegion<'a>> {
    ('{', ws).parse_next(input)?;

    let mut blocks = Vec::new();
    if !input.starts_with(['^', '}']) {
        let ops = block_ops.parse_next(input)?;
        blocks.push(RawBlock {
            label: None,
            args: Vec::new(),
            ops,
        });
    }
    loop {
        ws.parse_next(input)?;
        if !input.starts_with('^') {
            break;
        }
        blocks.push(raw_block.parse_next(input)?);
    }

    (ws, '}').parse_next(input)?;
    Ok(RawRegion { blocks })
}
