//! The low-level IR this analysis operates over.
//!
//! A read-only "IR adapter" facade: a whole-program SSA-style IR with
//! explicit basic blocks, a closed set of instruction/terminal kinds, and
//! identity-compared variable references. Nothing here mutates a `Program`
//! once built; the flow-sensitive engine only ever reads through this
//! module. No array allocation size and no address-of operator distinct
//! from allocation, since neither has a caller in this analysis.

pub mod cfg;
pub mod parser;

use std::collections::{BTreeMap as Map, BTreeSet as Set};
use std::fmt;
use std::rc::Rc;

use hashconsing::{consign, HConsed, HashConsign};

// SECTION: identifiers

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub struct FuncId(Rc<str>);

pub fn func_id(name: impl AsRef<str>) -> FuncId {
    FuncId(Rc::from(name.as_ref()))
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub struct BbId(Rc<str>);

pub fn bb_id(name: impl AsRef<str>) -> BbId {
    BbId(Rc::from(name.as_ref()))
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub struct StructId(Rc<str>);

pub fn struct_id(name: impl AsRef<str>) -> StructId {
    StructId(Rc::from(name.as_ref()))
}

#[derive(Clone, Debug)]
pub struct FieldId {
    pub name: Rc<str>,
    pub typ: Type,
}

pub fn field_id(name: impl AsRef<str>, typ: Type) -> FieldId {
    FieldId {
        name: Rc::from(name.as_ref()),
        typ,
    }
}

impl PartialEq for FieldId {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for FieldId {}
impl PartialOrd for FieldId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for FieldId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}
impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.typ)
    }
}

/// An SSA value of pointer type: an alloca's result, a formal parameter, or
/// a load's result. Compared by identity, which for a well-formed SSA
/// program reduces to `(scope, name)` equality: no two distinct live values
/// in the same function share a name.
#[derive(Clone, Debug)]
pub struct VarId(Rc<VarIdData>);

#[derive(Debug)]
struct VarIdData {
    name: String,
    typ: Type,
    scope: Option<FuncId>,
}

pub fn var_id(name: impl AsRef<str>, typ: Type, scope: Option<FuncId>) -> VarId {
    VarId(Rc::new(VarIdData {
        name: name.as_ref().to_string(),
        typ,
        scope,
    }))
}

impl VarId {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn typ(&self) -> Type {
        self.0.typ.clone()
    }

    pub fn scope(&self) -> Option<&FuncId> {
        self.0.scope.as_ref()
    }

    /// Qualifies the name with its owning function, for diagnostics and for
    /// disambiguating identically-named locals across functions in dumps.
    pub fn with_funcid(&self) -> String {
        match &self.0.scope {
            Some(scope) => format!("{scope}.{self}"),
            None => self.to_string(),
        }
    }
}

impl PartialEq for VarId {
    fn eq(&self, other: &Self) -> bool {
        self.0.scope == other.0.scope && self.0.name == other.0.name
    }
}
impl Eq for VarId {}
impl PartialOrd for VarId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for VarId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.0.scope, &self.0.name).cmp(&(&other.0.scope, &other.0.name))
    }
}
impl std::hash::Hash for VarId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.scope.hash(state);
        self.0.name.hash(state);
    }
}
impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

// SECTION: types

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LirType {
    Int,
    Pointer(Type),
    Struct(StructId),
    Function {
        param_ty: Vec<Type>,
        ret_ty: Option<Type>,
    },
}

consign! {
    /// Interning factory for `LirType`.
    let TYPE_FACTORY = consign(37) for LirType;
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Type(pub HConsed<LirType>);

pub fn int_ty() -> Type {
    Type(TYPE_FACTORY.mk(LirType::Int))
}

pub fn ptr_ty(inner: Type) -> Type {
    Type(TYPE_FACTORY.mk(LirType::Pointer(inner)))
}

pub fn struct_ty(id: StructId) -> Type {
    Type(TYPE_FACTORY.mk(LirType::Struct(id)))
}

pub fn fn_ty(param_ty: Vec<Type>, ret_ty: Option<Type>) -> Type {
    Type(TYPE_FACTORY.mk(LirType::Function { param_ty, ret_ty }))
}

impl Type {
    pub fn is_ptr(&self) -> bool {
        matches!(self.0.get(), LirType::Pointer(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self.0.get(), LirType::Int)
    }

    pub fn is_function(&self) -> bool {
        matches!(self.0.get(), LirType::Function { .. })
    }

    /// Strips exactly one level of pointer indirection, or returns `self`
    /// unchanged for a non-pointer type. Deliberately shallow: chasing
    /// through multiple levels of indirection isn't needed by anything this
    /// analysis does (field-sensitivity and array precision are Non-goals).
    pub fn base_typ(&self) -> Type {
        match self.0.get() {
            LirType::Pointer(inner) => inner.clone(),
            _ => self.clone(),
        }
    }

    pub fn base_typ_is(&self, other: Type) -> bool {
        self.base_typ() == other
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            LirType::Int => write!(f, "int"),
            LirType::Pointer(inner) => write!(f, "&{inner}"),
            LirType::Struct(id) => write!(f, "struct {id}"),
            LirType::Function { param_ty, ret_ty } => {
                write!(
                    f,
                    "({})->",
                    param_ty
                        .iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join(",")
                )?;
                match ret_ty {
                    Some(t) => write!(f, "{t}"),
                    None => write!(f, "_"),
                }
            }
        }
    }
}
impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
// Ordered by display form so `Type` can key a `BTreeMap` without a bespoke
// structural ordering over hash-consed enums.
impl PartialOrd for Type {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Type {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

// SECTION: operands, instructions, terminals

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operand {
    Var(VarId),
    Const(i64),
}

impl Operand {
    pub fn typ(&self) -> Type {
        match self {
            Operand::Var(v) => v.typ(),
            Operand::Const(_) => int_ty(),
        }
    }

    pub fn as_var(&self) -> Option<&VarId> {
        match self {
            Operand::Var(v) => Some(v),
            Operand::Const(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(v) => write!(f, "{v}"),
            Operand::Const(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
}
impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Lt,
    Le,
}
impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "==",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
        })
    }
}

/// One instruction inside a basic block. A closed tagged variant, matched
/// once per consumer rather than dispatched through a trait object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// `lhs = alloc`: a stack-allocation site. The instruction itself is the
    /// abstract memory object it allocates; there is no separate
    /// address-of operator, so the allocation's own result is simultaneously
    /// the pointer value and the object it points to.
    Alloc { lhs: VarId },
    Arith {
        lhs: VarId,
        aop: ArithOp,
        op1: Operand,
        op2: Operand,
    },
    Cmp {
        lhs: VarId,
        rop: CmpOp,
        op1: Operand,
        op2: Operand,
    },
    Copy { lhs: VarId, op: Operand },
    /// Pointer arithmetic (`getelementptr`-equivalent). Accepted but
    /// contributes no Andersen/labeling constraints.
    Gep {
        lhs: VarId,
        src: VarId,
        idx: Operand,
    },
    /// Field projection (`getelementptr`-into-a-struct-equivalent). Same
    /// treatment as `Gep`.
    Gfp {
        lhs: VarId,
        src: VarId,
        field: FieldId,
    },
    Load { lhs: VarId, src: VarId },
    Store { dst: VarId, op: Operand },
    CallExt {
        lhs: Option<VarId>,
        ext_callee: String,
        args: Vec<Operand>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstKind {
    Alloc,
    Store,
    Load,
    Call,
    Other,
}

impl Instruction {
    pub fn kind(&self) -> InstKind {
        match self {
            Instruction::Alloc { .. } => InstKind::Alloc,
            Instruction::Store { .. } => InstKind::Store,
            Instruction::Load { .. } => InstKind::Load,
            Instruction::CallExt { .. } => InstKind::Call,
            Instruction::Arith { .. }
            | Instruction::Cmp { .. }
            | Instruction::Copy { .. }
            | Instruction::Gep { .. }
            | Instruction::Gfp { .. } => InstKind::Other,
        }
    }

    /// The instruction's own result, if it has one.
    pub fn lhs(&self) -> Option<&VarId> {
        match self {
            Instruction::Alloc { lhs }
            | Instruction::Arith { lhs, .. }
            | Instruction::Cmp { lhs, .. }
            | Instruction::Copy { lhs, .. }
            | Instruction::Gep { lhs, .. }
            | Instruction::Gfp { lhs, .. }
            | Instruction::Load { lhs, .. } => Some(lhs),
            Instruction::Store { .. } => None,
            Instruction::CallExt { lhs, .. } => lhs.as_ref(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Alloc { lhs } => write!(f, "{lhs} = alloc"),
            Instruction::Arith { lhs, aop, op1, op2 } => write!(f, "{lhs} = {op1} {aop} {op2}"),
            Instruction::Cmp { lhs, rop, op1, op2 } => write!(f, "{lhs} = {op1} {rop} {op2}"),
            Instruction::Copy { lhs, op } => write!(f, "{lhs} = {op}"),
            Instruction::Gep { lhs, src, idx } => write!(f, "{lhs} = gep {src}[{idx}]"),
            Instruction::Gfp { lhs, src, field } => write!(f, "{lhs} = gfp {src}.{}", field.name),
            Instruction::Load { lhs, src } => write!(f, "{lhs} = load {src}"),
            Instruction::Store { dst, op } => write!(f, "store {op}, {dst}"),
            Instruction::CallExt {
                lhs,
                ext_callee,
                args,
            } => {
                if let Some(lhs) = lhs {
                    write!(f, "{lhs} = ")?;
                }
                write!(
                    f,
                    "call_ext {ext_callee}({})",
                    args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
                )
            }
        }
    }
}

/// A basic block's terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Terminal {
    Branch { cond: Operand, tt: BbId, ff: BbId },
    Jump(BbId),
    CallDirect {
        lhs: Option<VarId>,
        callee: FuncId,
        args: Vec<Operand>,
        next_bb: BbId,
    },
    /// Indirect calls are labeled and left in the IR, but are never followed
    /// during Andersen solving or flow-sensitive propagation.
    CallIndirect {
        lhs: Option<VarId>,
        callee: Operand,
        args: Vec<Operand>,
        next_bb: BbId,
    },
    Ret(Option<Operand>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TermKind {
    Call,
    Return,
    Other,
}

impl Terminal {
    pub fn kind(&self) -> TermKind {
        match self {
            Terminal::CallDirect { .. } | Terminal::CallIndirect { .. } => TermKind::Call,
            Terminal::Ret(_) => TermKind::Return,
            Terminal::Branch { .. } | Terminal::Jump(_) => TermKind::Other,
        }
    }

    pub fn lhs(&self) -> Option<&VarId> {
        match self {
            Terminal::CallDirect { lhs, .. } | Terminal::CallIndirect { lhs, .. } => lhs.as_ref(),
            _ => None,
        }
    }

    pub fn successors(&self) -> Vec<BbId> {
        match self {
            Terminal::Branch { tt, ff, .. } => vec![tt.clone(), ff.clone()],
            Terminal::Jump(bb) => vec![bb.clone()],
            Terminal::CallDirect { next_bb, .. } | Terminal::CallIndirect { next_bb, .. } => {
                vec![next_bb.clone()]
            }
            Terminal::Ret(_) => vec![],
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Branch { cond, tt, ff } => write!(f, "branch {cond}, {tt}, {ff}"),
            Terminal::Jump(bb) => write!(f, "jump {bb}"),
            Terminal::CallDirect {
                lhs,
                callee,
                args,
                next_bb,
            } => {
                if let Some(lhs) = lhs {
                    write!(f, "{lhs} = ")?;
                }
                write!(
                    f,
                    "call {callee}({}) -> {next_bb}",
                    args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
                )
            }
            Terminal::CallIndirect {
                lhs,
                callee,
                args,
                next_bb,
            } => {
                if let Some(lhs) = lhs {
                    write!(f, "{lhs} = ")?;
                }
                write!(
                    f,
                    "call_indirect {callee}({}) -> {next_bb}",
                    args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
                )
            }
            Terminal::Ret(None) => write!(f, "ret"),
            Terminal::Ret(Some(op)) => write!(f, "ret {op}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicBlock {
    pub id: BbId,
    pub insts: Vec<Instruction>,
    pub term: Terminal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub id: FuncId,
    pub params: Vec<VarId>,
    pub locals: Set<VarId>,
    pub ret_ty: Option<Type>,
    pub body: Map<BbId, BasicBlock>,
}

impl Function {
    pub fn entry(&self) -> &BbId {
        // By convention (and by construction, see `parser`), the entry
        // block is always named "entry".
        static ENTRY: &str = "entry";
        debug_assert!(self.body.keys().any(|id| id.0.as_ref() == ENTRY));
        self.body
            .keys()
            .find(|id| id.0.as_ref() == ENTRY)
            .expect("function body has no entry block")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    pub functions: Map<FuncId, Function>,
    pub structs: Map<StructId, Set<FieldId>>,
    pub globals: Set<VarId>,
}

impl Program {
    /// Structural well-formedness checks that the rest of the pipeline
    /// relies on without re-checking: every branch/jump target exists,
    /// every function has an `entry` block, and every `Ret` operand is
    /// either absent, an alloca's result, or a load's result when the
    /// function's return type is a pointer.
    pub fn validate(self) -> Result<crate::commons::Valid<Program>, crate::errors::AnalysisError> {
        for (fid, f) in &self.functions {
            if !f.body.contains_key(&bb_id("entry")) {
                return Err(crate::errors::AnalysisError::malformed_ir(format!(
                    "function '{fid}' has no 'entry' block"
                )));
            }
            for (bbid, bb) in &f.body {
                for succ in bb.term.successors() {
                    if !f.body.contains_key(&succ) {
                        return Err(crate::errors::AnalysisError::malformed_ir(format!(
                            "function '{fid}', block '{bbid}': terminal targets unknown block '{succ}'"
                        )));
                    }
                }
                if let Terminal::Ret(Some(op)) = &bb.term {
                    if op.typ().is_ptr() {
                        if let Operand::Var(v) = op {
                            let defines_v = f
                                .body
                                .values()
                                .flat_map(|b| b.insts.iter())
                                .any(|i| matches!(i.lhs(), Some(l) if l == v))
                                || f.params.contains(v);
                            if !defines_v {
                                return Err(crate::errors::AnalysisError::malformed_ir(format!(
                                    "function '{fid}', block '{bbid}': return operand '{v}' is neither an alloca, a load, nor a parameter"
                                )));
                            }
                        }
                    }
                }
            }
        }
        Ok(crate::commons::Valid(self))
    }
}

#[cfg(test)]
mod tests {
    use super::parser::parse_program;
    use super::{bb_id, func_id, int_ty, ptr_ty, var_id, Operand, Terminal};
    use crate::errors::AnalysisErrorKind;

    #[test]
    fn well_formed_program_validates() {
        let program = parse_program(
            "fn f() -> int {\nentry:\n  a: &int = alloc\n  ret 0\n}\n",
        )
        .unwrap();
        assert!(program.validate().is_ok());
    }

    #[test]
    fn jump_to_unknown_block_is_malformed() {
        let program = parse_program(
            "fn f() -> int {\nentry:\n  jump missing\n}\n",
        )
        .unwrap();
        let err = program.validate().unwrap_err();
        assert_eq!(err.kind, AnalysisErrorKind::MalformedIr);
        assert!(err.context.contains("missing"));
    }

    #[test]
    fn return_of_a_plain_int_in_a_pointer_returning_function_is_malformed() {
        // `ret 0` typechecks fine for a function declared `-> int`; this
        // exercises the same check on a pointer-returning function whose
        // `ret` operand is a constant rather than an alloca/load/parameter.
        // The parser always resolves a bare identifier to a declared
        // variable, so the malformed shape here is a `ret` of an
        // undeclared-as-pointer local built directly rather than through
        // the textual front end.
        let mut program = parse_program(
            "fn f() -> &int {\nentry:\n  a: &int = alloc\n  ret a\n}\n",
        )
        .unwrap();
        // Sanity: as parsed, `ret a` is well-formed (`a` is an alloca).
        assert!(program.clone().validate().is_ok());

        // Rewrite the `ret` operand to a pointer-typed variable that is
        // neither a parameter nor the result of any instruction in the
        // function: a return value that is neither an alloca nor a load.
        let f = program.functions.get_mut(&func_id("f")).unwrap();
        let bogus = var_id("nowhere", ptr_ty(int_ty()), Some(f.id.clone()));
        let entry = f.body.get_mut(&bb_id("entry")).unwrap();
        entry.term = Terminal::Ret(Some(Operand::Var(bogus)));

        let err = program.validate().unwrap_err();
        assert_eq!(err.kind, AnalysisErrorKind::MalformedIr);
        assert!(err.context.contains("nowhere"));
    }

    #[test]
    fn missing_entry_block_is_malformed() {
        let program = parse_program("fn f() -> int {\nonly_block:\n  ret 0\n}\n").unwrap();
        let err = program.validate().unwrap_err();
        assert_eq!(err.kind, AnalysisErrorKind::MalformedIr);
        assert!(err.context.contains("entry"));
    }
}
