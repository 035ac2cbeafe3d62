use crate::lexer::{tokenize, TokenKind};
use crate::{FormulaError, Result};
use indexmap::IndexSet;

/// Extract the reference-shaped operand tokens a formula reads from.
///
/// Returns the distinct tokens in first-appearance order: single cell refs
/// (`A1`, `$B$2`, `Sheet1!C3`), ranges joined back into one `:` token
/// (`A1:B10`, `'My Sheet'!A1:A5`), and bare identifiers that may name a
/// defined alias. Function names (identifier followed by `(`), numeric and
/// string literals, error literals, and operators are dropped. Malformed
/// formula text is an error; callers degrade it to a per-cell warning.
pub fn extract_inputs(formula: &str) -> Result<Vec<String>> {
    let body = formula.trim_start().strip_prefix('=').unwrap_or(formula);
    let tokens = tokenize(body)?;

    let mut inputs: IndexSet<String> = IndexSet::new();
    let mut i = 0;
    while tokens[i].kind != TokenKind::Eof {
        match &tokens[i].kind {
            TokenKind::SheetName(sheet) | TokenKind::Identifier(sheet)
                if tokens[i + 1].kind == TokenKind::Bang =>
            {
                let qualifier = match &tokens[i].kind {
                    TokenKind::SheetName(name) => format!("'{name}'"),
                    _ => sheet.clone(),
                };
                match &tokens[i + 2].kind {
                    TokenKind::CellRef(start) => {
                        let (reference, consumed) = join_range(start, &tokens[i + 3..]);
                        inputs.insert(format!("{qualifier}!{reference}"));
                        i += 3 + consumed;
                    }
                    TokenKind::Identifier(name) => {
                        // Sheet-scoped defined name; resolution decides its fate.
                        inputs.insert(format!("{qualifier}!{name}"));
                        i += 3;
                    }
                    other => {
                        return Err(FormulaError::Parse(format!(
                            "expected cell reference after '{qualifier}!' at {}, found {other:?}",
                            tokens[i + 2].pos
                        )));
                    }
                }
            }
            TokenKind::CellRef(start) => {
                let (reference, consumed) = join_range(start, &tokens[i + 1..]);
                inputs.insert(reference);
                i += 1 + consumed;
            }
            TokenKind::Identifier(name) => {
                if tokens[i + 1].kind != TokenKind::LParen && !is_boolean_literal(name) {
                    inputs.insert(name.clone());
                }
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }
    Ok(inputs.into_iter().collect())
}

/// Join `start` with a following `:CellRef` pair into one range token.
/// Returns the token text and how many extra tokens were consumed.
fn join_range(start: &str, rest: &[crate::lexer::Token]) -> (String, usize) {
    if rest.len() >= 2 && rest[0].kind == TokenKind::Colon {
        if let TokenKind::CellRef(end) = &rest[1].kind {
            return (format!("{start}:{end}"), 2);
        }
    }
    (start.to_string(), 0)
}

fn is_boolean_literal(name: &str) -> bool {
    name.eq_ignore_ascii_case("TRUE") || name.eq_ignore_ascii_case("FALSE")
}
