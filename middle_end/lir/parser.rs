//! A minimal textual front end for building a [`Program`] directly, for
//! tests and the `bin/` tools.
//!
//! A front end (`front_end::parser`, `pest`-driven) and
//! `middle_end::constraints::fromstr_impl` (`impl FromStr for Constraints`)
//! both parse a textual form into an in-memory structure by hand; this
//! module follows the same shape, a `Parser` struct walking a token
//! stream, `expect`/`error` helpers, one function per grammar production,
//! but over IR-level syntax directly rather than a source language that
//! then has to be lowered, since the analysis needs no textual *source*
//! language at all.
//!
//! Grammar (informally):
//!
//! ```text
//! program   := struct_decl* func_decl*
//! struct_decl := "struct" ID "{" (ID ":" type ",")* "}"
//! func_decl := "fn" ID "(" (ID ":" type),* ")" ("->" type)? "{" block+ "}"
//! block     := ID ":" inst* term
//! inst      := ID (":" type)? "=" rhs
//!            | "store" operand "," ID
//! rhs       := "alloc" | operand | operand arith_op operand | operand cmp_op operand
//!            | "load" ID | "gep" ID "[" operand "]" | "gfp" ID "." ID
//!            | "call_ext" ID "(" operand,* ")"
//! term      := "jump" ID
//!            | "branch" operand "," ID "," ID
//!            | (ID "=")? "call" ID "(" operand,* ")" "->" ID
//!            | (ID "=")? "call_indirect" operand "(" operand,* ")" "->" ID
//!            | "ret" operand?
//! type      := "int" | "&" type | ID
//! operand   := ID | INT
//! ```

use std::collections::{BTreeMap as Map, BTreeSet as Set};
use std::fmt;
use std::str::FromStr;

use super::{
    bb_id, field_id, func_id, fn_ty, int_ty, ptr_ty, struct_id, struct_ty, var_id, ArithOp,
    BasicBlock, CmpOp, FieldId, FuncId, Function, Instruction, Operand, Program, StructId,
    Terminal, Type, VarId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at byte {}: {}", self.position, self.message)
    }
}
impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(i64),
    Sym(&'static str),
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }
            if c == '/' && self.src[pos..].starts_with("//") {
                while let Some(&(_, c)) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.chars.next();
                }
                continue;
            }
            if c.is_alphabetic() || c == '_' {
                let start = pos;
                let mut end = pos;
                while let Some(&(p, c)) = self.chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        end = p + c.len_utf8();
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((Token::Ident(self.src[start..end].to_string()), start));
                continue;
            }
            if c.is_ascii_digit() || (c == '-' && self.peek_is_digit_after_minus()) {
                let start = pos;
                let mut end = pos;
                self.chars.next();
                end += c.len_utf8();
                while let Some(&(p, c)) = self.chars.peek() {
                    if c.is_ascii_digit() {
                        end = p + c.len_utf8();
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                let text = &self.src[start..end];
                let n = text.parse::<i64>().map_err(|_| ParseError {
                    message: format!("invalid integer literal '{text}'"),
                    position: start,
                })?;
                tokens.push((Token::Int(n), start));
                continue;
            }
            if c == '-' && self.src[pos..].starts_with("->") {
                self.chars.next();
                self.chars.next();
                tokens.push((Token::Sym("->"), pos));
                continue;
            }
            let sym = match c {
                ':' => ":",
                '=' => "=",
                ',' => ",",
                '(' => "(",
                ')' => ")",
                '{' => "{",
                '}' => "}",
                '[' => "[",
                ']' => "]",
                '.' => ".",
                '&' => "&",
                '+' => "+",
                '-' => "-",
                '*' => "*",
                '<' => "<",
                '>' => ">",
                _ => {
                    return Err(ParseError {
                        message: format!("unexpected character '{c}'"),
                        position: pos,
                    })
                }
            };
            self.chars.next();
            // "<=" as a single token
            if sym == "<" {
                if let Some(&(_, '=')) = self.chars.peek() {
                    self.chars.next();
                    tokens.push((Token::Sym("<="), pos));
                    continue;
                }
            }
            if sym == "=" {
                if let Some(&(_, '=')) = self.chars.peek() {
                    self.chars.next();
                    tokens.push((Token::Sym("=="), pos));
                    continue;
                }
            }
            tokens.push((Token::Sym(sym), pos));
        }
        Ok(tokens)
    }

    fn peek_is_digit_after_minus(&self) -> bool {
        let mut it = self.chars.clone();
        it.next();
        matches!(it.peek(), Some((_, c)) if c.is_ascii_digit())
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    // per-function symbol table built while parsing that function's body
    scope: Option<FuncId>,
    vars: Map<String, VarId>,
    structs: Map<StructId, Set<FieldId>>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, p)| *p)
            .unwrap_or(usize::MAX)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        tok
    }

    fn error<T>(&self, msg: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError {
            message: msg.into(),
            position: self.position(),
        })
    }

    fn expect_sym(&mut self, sym: &'static str) -> Result<(), ParseError> {
        match self.bump() {
            Some(Token::Sym(s)) if s == sym => Ok(()),
            other => self.error(format!("expected '{sym}', found {other:?}")),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Some(Token::Ident(s)) => Ok(s),
            other => self.error(format!("expected an identifier, found {other:?}")),
        }
    }

    fn at_sym(&self, sym: &str) -> bool {
        matches!(self.peek(), Some(Token::Sym(s)) if *s == sym)
    }

    fn at_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == name)
    }

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        if self.at_sym("&") {
            self.bump();
            let inner = self.parse_type()?;
            return Ok(ptr_ty(inner));
        }
        let name = self.expect_ident()?;
        match name.as_str() {
            "int" => Ok(int_ty()),
            other => Ok(struct_ty(struct_id(other))),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        match self.bump() {
            Some(Token::Int(n)) => Ok(Operand::Const(n)),
            Some(Token::Ident(name)) => {
                let v = self.vars.get(&name).cloned().ok_or_else(|| ParseError {
                    message: format!("use of undeclared variable '{name}'"),
                    position: self.position(),
                })?;
                Ok(Operand::Var(v))
            }
            other => self.error(format!("expected an operand, found {other:?}")),
        }
    }

    fn declare(&mut self, name: String, typ: Type) -> VarId {
        let v = var_id(&name, typ, self.scope.clone());
        self.vars.insert(name, v.clone());
        v
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut structs = Map::new();
        let mut functions = Map::new();
        let globals = Set::new();

        while self.peek().is_some() {
            if self.at_ident("struct") {
                self.bump();
                let (id, fields) = self.parse_struct_decl()?;
                structs.insert(id, fields);
            } else if self.at_ident("fn") {
                self.structs = structs.clone();
                let f = self.parse_function()?;
                functions.insert(f.id.clone(), f);
            } else {
                return self.error("expected 'struct' or 'fn'");
            }
        }

        Ok(Program {
            functions,
            structs,
            globals,
        })
    }

    fn parse_struct_decl(&mut self) -> Result<(StructId, Set<FieldId>), ParseError> {
        let name = self.expect_ident()?;
        self.expect_sym("{")?;
        let mut fields = Set::new();
        while !self.at_sym("}") {
            let fname = self.expect_ident()?;
            self.expect_sym(":")?;
            let ftyp = self.parse_type()?;
            fields.insert(field_id(&fname, ftyp));
            if self.at_sym(",") {
                self.bump();
            }
        }
        self.expect_sym("}")?;
        Ok((struct_id(&name), fields))
    }

    fn parse_function(&mut self) -> Result<Function, ParseError> {
        self.bump(); // "fn"
        let name = self.expect_ident()?;
        let id = func_id(&name);
        self.scope = Some(id.clone());
        self.vars = Map::new();

        self.expect_sym("(")?;
        let mut param_types = Vec::new();
        let mut params = Vec::new();
        while !self.at_sym(")") {
            let pname = self.expect_ident()?;
            self.expect_sym(":")?;
            let ptyp = self.parse_type()?;
            param_types.push(ptyp.clone());
            params.push(self.declare(pname, ptyp));
            if self.at_sym(",") {
                self.bump();
            }
        }
        self.expect_sym(")")?;

        let ret_ty = if self.at_sym("->") {
            self.bump();
            Some(self.parse_type()?)
        } else {
            None
        };
        // Record the function's own type as a global, treating function
        // names as globals of function-pointer type.
        let _ = fn_ty(param_types, ret_ty.clone());

        self.expect_sym("{")?;
        let mut body = Map::new();
        while !self.at_sym("}") {
            let block = self.parse_block()?;
            body.insert(block.id.clone(), block);
        }
        self.expect_sym("}")?;

        let mut locals = Set::new();
        for v in self.vars.values() {
            if !params.contains(v) {
                locals.insert(v.clone());
            }
        }

        Ok(Function {
            id,
            params,
            locals,
            ret_ty,
            body,
        })
    }

    fn parse_block(&mut self) -> Result<BasicBlock, ParseError> {
        let name = self.expect_ident()?;
        self.expect_sym(":")?;
        let id = bb_id(&name);
        let mut insts = Vec::new();

        loop {
            if self.is_terminal_start() {
                let term = self.parse_terminal()?;
                return Ok(BasicBlock { id, insts, term });
            }
            insts.push(self.parse_inst()?);
        }
    }

    // Disambiguates the terminal `call`/`call_indirect` forms from the
    // instruction grammar by scanning ahead (without consuming) past an
    // optional `lhs` / `lhs : type` prefix to see whether the next `=` is
    // followed by the `call`/`call_indirect` keyword. Every other
    // instruction keyword (`alloc`, `load`, `gep`, `gfp`, `call_ext`) is
    // handled by `parse_inst` instead.
    fn is_terminal_start(&self) -> bool {
        if self.at_ident("jump") || self.at_ident("branch") || self.at_ident("ret") {
            return true;
        }
        if self.at_ident("call") || self.at_ident("call_indirect") {
            return true;
        }
        if !matches!(self.peek(), Some(Token::Ident(_))) {
            return false;
        }
        let mut i = self.pos + 1;
        if matches!(self.tokens.get(i), Some((Token::Sym(":"), _))) {
            i += 1;
            while matches!(self.tokens.get(i), Some((Token::Sym("&"), _))) {
                i += 1;
            }
            i += 1; // the base type identifier
        }
        match self.tokens.get(i) {
            Some((Token::Sym("="), _)) => matches!(
                self.tokens.get(i + 1),
                Some((Token::Ident(name), _)) if name == "call" || name == "call_indirect"
            ),
            _ => false,
        }
    }

    fn parse_inst(&mut self) -> Result<Instruction, ParseError> {
        let lhs_name = self.expect_ident()?;

        let lhs_type_annotation = if self.at_sym(":") {
            self.bump();
            Some(self.parse_type()?)
        } else {
            None
        };

        if lhs_name == "store" {
            let op = self.parse_operand()?;
            self.expect_sym(",")?;
            let dst_name = self.expect_ident()?;
            let dst = self.vars.get(&dst_name).cloned().ok_or_else(|| ParseError {
                message: format!("use of undeclared variable '{dst_name}'"),
                position: self.position(),
            })?;
            return Ok(Instruction::Store { dst, op });
        }

        self.expect_sym("=")?;

        if self.at_ident("alloc") {
            self.bump();
            let elem_ty = lhs_type_annotation
                .map(|t| t.base_typ())
                .unwrap_or_else(int_ty);
            let lhs = self.declare(lhs_name, ptr_ty(elem_ty));
            return Ok(Instruction::Alloc { lhs });
        }
        if self.at_ident("load") {
            self.bump();
            let src_name = self.expect_ident()?;
            let src = self.vars.get(&src_name).cloned().ok_or_else(|| ParseError {
                message: format!("use of undeclared variable '{src_name}'"),
                position: self.position(),
            })?;
            let lhs = self.declare(lhs_name, src.typ().base_typ());
            return Ok(Instruction::Load { lhs, src });
        }
        if self.at_ident("gep") {
            self.bump();
            let src_name = self.expect_ident()?;
            let src = self.vars.get(&src_name).cloned().ok_or_else(|| ParseError {
                message: format!("use of undeclared variable '{src_name}'"),
                position: self.position(),
            })?;
            self.expect_sym("[")?;
            let idx = self.parse_operand()?;
            self.expect_sym("]")?;
            let lhs = self.declare(lhs_name, src.typ());
            return Ok(Instruction::Gep { lhs, src, idx });
        }
        if self.at_ident("gfp") {
            self.bump();
            let src_name = self.expect_ident()?;
            let src = self.vars.get(&src_name).cloned().ok_or_else(|| ParseError {
                message: format!("use of undeclared variable '{src_name}'"),
                position: self.position(),
            })?;
            self.expect_sym(".")?;
            let field_name = self.expect_ident()?;
            let struct_id_of_src = match src.typ().base_typ().0.get() {
                super::LirType::Struct(id) => id.clone(),
                _ => return self.error(format!("'{src_name}' is not a struct pointer")),
            };
            let field = self
                .structs
                .get(&struct_id_of_src)
                .and_then(|fields| fields.iter().find(|fl| fl.name.as_ref() == field_name.as_str()))
                .cloned()
                .ok_or_else(|| ParseError {
                    message: format!("unknown field '{field_name}'"),
                    position: self.position(),
                })?;
            let field_typ = field.typ.clone();
            let lhs = self.declare(lhs_name, ptr_ty(field_typ));
            return Ok(Instruction::Gfp { lhs, src, field });
        }
        if self.at_ident("call_ext") {
            self.bump();
            let callee = self.expect_ident()?;
            self.expect_sym("(")?;
            let mut args = Vec::new();
            while !self.at_sym(")") {
                args.push(self.parse_operand()?);
                if self.at_sym(",") {
                    self.bump();
                }
            }
            self.expect_sym(")")?;
            let lhs = self.declare(lhs_name, lhs_type_annotation.unwrap_or_else(int_ty));
            return Ok(Instruction::CallExt {
                lhs: Some(lhs),
                ext_callee: callee,
                args,
            });
        }

        // Otherwise: a plain copy, arithmetic, or comparison.
        let op1 = self.parse_operand()?;
        if let Some(Token::Sym(sym)) = self.peek().cloned() {
            let aop = match sym {
                "+" => Some(ArithOp::Add),
                "-" => Some(ArithOp::Sub),
                "*" => Some(ArithOp::Mul),
                _ => None,
            };
            let rop = match sym {
                "==" => Some(CmpOp::Eq),
                "<" => Some(CmpOp::Lt),
                "<=" => Some(CmpOp::Le),
                _ => None,
            };
            if let Some(aop) = aop {
                self.bump();
                let op2 = self.parse_operand()?;
                let lhs = self.declare(lhs_name, int_ty());
                return Ok(Instruction::Arith { lhs, aop, op1, op2 });
            }
            if let Some(rop) = rop {
                self.bump();
                let op2 = self.parse_operand()?;
                let lhs = self.declare(lhs_name, int_ty());
                return Ok(Instruction::Cmp { lhs, rop, op1, op2 });
            }
        }
        let typ = lhs_type_annotation.unwrap_or_else(|| op1.typ());
        let lhs = self.declare(lhs_name, typ);
        Ok(Instruction::Copy { lhs, op: op1 })
    }

    fn parse_terminal(&mut self) -> Result<Terminal, ParseError> {
        if self.at_ident("jump") {
            self.bump();
            let target = self.expect_ident()?;
            return Ok(Terminal::Jump(bb_id(&target)));
        }
        if self.at_ident("branch") {
            self.bump();
            let cond = self.parse_operand()?;
            self.expect_sym(",")?;
            let tt = self.expect_ident()?;
            self.expect_sym(",")?;
            let ff = self.expect_ident()?;
            return Ok(Terminal::Branch {
                cond,
                tt: bb_id(&tt),
                ff: bb_id(&ff),
            });
        }
        if self.at_ident("ret") {
            self.bump();
            let op = if self.at_sym("}") {
                None
            } else {
                Some(self.parse_operand()?)
            };
            return Ok(Terminal::Ret(op));
        }

        let lhs = if !self.at_ident("call") && !self.at_ident("call_indirect") {
            let name = self.expect_ident()?;
            let annotation = if self.at_sym(":") {
                self.bump();
                Some(self.parse_type()?)
            } else {
                None
            };
            self.expect_sym("=")?;
            Some((name, annotation))
        } else {
            None
        };

        if self.at_ident("call") {
            self.bump();
            let callee_name = self.expect_ident()?;
            self.expect_sym("(")?;
            let mut args = Vec::new();
            while !self.at_sym(")") {
                args.push(self.parse_operand()?);
                if self.at_sym(",") {
                    self.bump();
                }
            }
            self.expect_sym(")")?;
            self.expect_sym("->")?;
            let next = self.expect_ident()?;
            let lhs = lhs.map(|(name, annotation)| {
                self.declare(name, annotation.unwrap_or_else(int_ty))
            });
            return Ok(Terminal::CallDirect {
                lhs,
                callee: func_id(&callee_name),
                args,
                next_bb: bb_id(&next),
            });
        }

        if self.at_ident("call_indirect") {
            self.bump();
            let callee = self.parse_operand()?;
            self.expect_sym("(")?;
            let mut args = Vec::new();
            while !self.at_sym(")") {
                args.push(self.parse_operand()?);
                if self.at_sym(",") {
                    self.bump();
                }
            }
            self.expect_sym(")")?;
            self.expect_sym("->")?;
            let next = self.expect_ident()?;
            let lhs = lhs.map(|(name, annotation)| {
                self.declare(name, annotation.unwrap_or_else(int_ty))
            });
            return Ok(Terminal::CallIndirect {
                lhs,
                callee,
                args,
                next_bb: bb_id(&next),
            });
        }

        self.error("expected a terminal instruction ('jump', 'branch', 'ret', 'call', or 'call_indirect')")
    }
}

/// Parses a standalone function body (no enclosing `fn`/`{`/`}`), used by
/// `Program::from_fragments` in tests that only need one function.
pub fn parse_program(src: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        scope: None,
        vars: Map::new(),
        structs: Map::new(),
    };
    parser.parse_program()
}

impl FromStr for Program {
    type Err = ParseError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        parse_program(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_struct_and_gfp() {
        let program = parse_program(
            "struct Pair { x: int, y: int }\nfn f() -> int {\nentry:\n  s: Pair = alloc\n  px = gfp s.x\n  v = load px\n  ret v\n}\n",
        )
        .unwrap();
        let f = &program.functions[&func_id("f")];
        let entry = &f.body[&bb_id("entry")];
        assert!(matches!(entry.insts[1], Instruction::Gfp { .. }));
        assert_eq!(program.structs.len(), 1);
    }

    #[test]
    fn parses_direct_and_indirect_calls() {
        let program = parse_program(
            "fn g() -> int {\nentry:\n  ret 0\n}\nfn f(fp: int) -> int {\nentry:\n  r = call g() -> after\nafter:\n  ri = call_indirect fp() -> done\ndone:\n  ret r\n}\n",
        )
        .unwrap();
        let f = &program.functions[&func_id("f")];
        assert!(matches!(
            f.body[&bb_id("entry")].term,
            Terminal::CallDirect { .. }
        ));
        assert!(matches!(
            f.body[&bb_id("after")].term,
            Terminal::CallIndirect { .. }
        ));
    }

    #[test]
    fn reports_position_of_unexpected_character() {
        let err = parse_program("fn f() -> int {\nentry:\n  a = #\n}\n").unwrap_err();
        assert!(err.message.contains("unexpected character"));
    }

    #[test]
    fn reports_use_of_undeclared_variable() {
        let err = parse_program("fn f() -> int {\nentry:\n  ret x\n}\n").unwrap_err();
        assert!(err.message.contains("undeclared variable"));
    }
}
