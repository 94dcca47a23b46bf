//! Parser for the textual IR format.

use super::{Block, Function, Global, GlobalInit, Inst, Module, Opcode, Operand};
use crate::core::{IrParseError, ParseResult};

pub fn parse(text: &str) -> ParseResult<Module> {
    let mut module = Module::new("module");
    let mut current: Option<Function> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if line == "}" && current.is_some() {
            if let Some(func) = current.take() {
                module.functions.push(func);
            }
            continue;
        }

        if let Some(func) = current.as_mut() {
            if let Some(label) = line.strip_suffix(':') {
                let label = label.trim();
                if label.is_empty() || label.contains(char::is_whitespace) {
                    return Err(IrParseError::Malformed {
                        line: line_no,
                        reason: format!("bad block label '{label}'"),
                    });
                }
                func.blocks.push(Block::new(label));
                continue;
            }
            let Some(block) = func.blocks.last_mut() else {
                return Err(IrParseError::Malformed {
                    line: line_no,
                    reason: "instruction before first block label".to_string(),
                });
            };
            block.insts.push(parse_inst(line, line_no)?);
            continue;
        }

        if let Some(rest) = line.strip_prefix("extern ") {
            module.functions.push(Function::declaration(rest.trim()));
        } else if line.starts_with('@') {
            module.globals.push(parse_global(line, line_no)?);
        } else {
            current = Some(parse_func_header(line, line_no)?);
        }
    }

    if let Some(func) = current {
        return Err(IrParseError::UnterminatedFunction { name: func.name });
    }

    Ok(module)
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_func_header(line: &str, line_no: usize) -> ParseResult<Function> {
    let Some(rest) = line.strip_suffix('{') else {
        return Err(IrParseError::Malformed {
            line: line_no,
            reason: format!("expected function header ending in '{{', got '{line}'"),
        });
    };
    let rest = rest.trim();
    let Some((name, params)) = rest.split_once('(') else {
        return Err(IrParseError::Malformed {
            line: line_no,
            reason: format!("missing parameter list in header '{rest}'"),
        });
    };
    let Some(params) = params.strip_suffix(')') else {
        return Err(IrParseError::Malformed {
            line: line_no,
            reason: format!("unterminated parameter list in header '{rest}'"),
        });
    };

    let mut parsed = Vec::new();
    for param in params.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some(name) = param.strip_prefix('%') else {
            return Err(IrParseError::MalformedOperand {
                line: line_no,
                token: param.to_string(),
            });
        };
        parsed.push(name.to_string());
    }

    Ok(Function {
        name: name.trim().to_string(),
        params: parsed,
        blocks: Vec::new(),
    })
}

fn parse_inst(line: &str, line_no: usize) -> ParseResult<Inst> {
    let (result, rest) = if let Some(stripped) = line.strip_prefix('%') {
        let Some((lhs, rhs)) = stripped.split_once('=') else {
            return Err(IrParseError::Malformed {
                line: line_no,
                reason: format!("expected '=' after result name in '{line}'"),
            });
        };
        (Some(lhs.trim().to_string()), rhs.trim())
    } else {
        (None, line)
    };

    let (op_tok, args) = match rest.split_once(char::is_whitespace) {
        Some((op, args)) => (op, args.trim()),
        None => (rest, ""),
    };
    let Some(op) = Opcode::from_str(op_tok) else {
        return Err(IrParseError::UnknownOpcode {
            line: line_no,
            opcode: op_tok.to_string(),
        });
    };

    let mut operands = Vec::new();
    if !args.is_empty() {
        for token in args.split(',').map(str::trim) {
            operands.push(parse_operand(token, line_no)?);
        }
    }

    Ok(Inst::new(result, op, operands))
}

fn parse_operand(token: &str, line_no: usize) -> ParseResult<Operand> {
    if let Some(name) = token.strip_prefix('%') {
        return Ok(Operand::Value(name.to_string()));
    }
    if let Some(name) = token.strip_prefix('^') {
        return Ok(Operand::Block(name.to_string()));
    }
    if let Some(name) = token.strip_prefix('@') {
        return Ok(Operand::Global(name.to_string()));
    }
    if token.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return token.parse::<i64>().map(Operand::Imm).map_err(|_| {
            IrParseError::MalformedOperand {
                line: line_no,
                token: token.to_string(),
            }
        });
    }
    if !token.is_empty() && token.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return Ok(Operand::Func(token.to_string()));
    }
    Err(IrParseError::MalformedOperand {
        line: line_no,
        token: token.to_string(),
    })
}

fn parse_global(line: &str, line_no: usize) -> ParseResult<Global> {
    let rest = &line[1..];
    let Some((name, value)) = rest.split_once('=') else {
        return Err(IrParseError::Malformed {
            line: line_no,
            reason: format!("expected '=' in global definition '{line}'"),
        });
    };
    let name = name.trim().to_string();
    let value = value.trim();

    let init = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        GlobalInit::Str(value[1..value.len() - 1].to_string())
    } else if let Some(list) = value.strip_prefix("bytes") {
        let list = list.trim();
        let Some(inner) = list.strip_prefix('[').and_then(|l| l.strip_suffix(']')) else {
            return Err(IrParseError::Malformed {
                line: line_no,
                reason: format!("expected byte list in '{value}'"),
            });
        };
        let mut bytes = Vec::new();
        for token in inner.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let byte = token.parse::<u8>().map_err(|_| IrParseError::MalformedOperand {
                line: line_no,
                token: token.to_string(),
            })?;
            bytes.push(byte);
        }
        GlobalInit::Bytes(bytes)
    } else if value == "zero" {
        GlobalInit::Zero
    } else {
        return Err(IrParseError::Malformed {
            line: line_no,
            reason: format!("unrecognized global initializer '{value}'"),
        });
    };

    Ok(Global { name, init })
}
