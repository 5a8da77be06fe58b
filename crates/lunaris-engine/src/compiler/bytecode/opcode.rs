//! Instruction set of the Lunaris processor
//!
//! The processor is a stack machine. Operands live in the owning
//! [`Instruction`](super::Instruction): `num_val`/`num_val2` for integers,
//! `value` for constants, `symbol`/`symbols` for variable references and
//! `name` for descriptions used in error messages.
//!
//! Stack offsets are counted from the top: offset 0 is the last pushed value.

/// Opcode enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // ===== Stack Manipulation & Constants =====
    /// No operation
    Nop,
    /// Push `value`
    Literal,
    /// Pop `num_val` values
    Pop,
    /// Push a copy of the value at offset `num_val`
    Copy,
    /// Replace a tuple on top of the stack with its first value
    Scalar,
    /// Pop `num_val` values and push them as one tuple (last one expanded)
    MkTuple,
    /// Push the elements of the tuple at offset `num_val`
    ExpTuple,

    // ===== Variables =====
    /// Push local slot `num_val`
    Local,
    /// Push upvalue `num_val` of the running closure
    Upvalue,
    /// Store the value at offset `num_val` (tuple element `num_val2`) into local `symbol`
    StoreLcl,
    /// Store the value at offset `num_val` (tuple element `num_val2`) into upvalue `symbol`
    StoreUpv,

    // ===== Tables =====
    /// Pop key then object, push `object[key]` (honours `__index`)
    Index,
    /// Pop key then object, store the value at offset `num_val` (tuple
    /// element `num_val2`) into `object[key]` (honours `__newindex`)
    IndexSet,
    /// Pop object, push `object[name]` then object (method call prologue)
    Method,
    /// Push a new empty table
    NewTable,
    /// Pop value then key, raw-set them into the table now on top
    TblInitN,
    /// Pop value, raw-set it at position `num_val2` of the table now on top;
    /// with `num_val == 1` a tuple is expanded from that position on
    TblInitI,

    // ===== Functions =====
    /// Push a closure starting at `num_val` capturing `symbols`
    Closure,
    /// Function prologue: allocate `num_val` slots, bind parameters `symbols`
    /// and the varargs local `symbol`
    BeginFn,
    /// Call the function below `num_val` arguments; `num_val2 == 1` marks a tail call
    Call,
    /// Return `num_val` (0 or 1) values
    Ret,

    // ===== Control Flow =====
    /// Jump to `num_val`, discarding `num_val2` stack values first
    Jump,
    /// Pop a value, jump to `num_val` if it is false or nil
    Jf,
    /// If the top is false or nil jump to `num_val` keeping it, else pop it (`and`)
    JfOrPop,
    /// If the top is truthy jump to `num_val` keeping it, else pop it (`or`)
    JtOrPop,

    // ===== Operators =====
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Power,
    Concat,
    /// Pop two values, push their equality
    Eq,
    /// Pop two values, push `a < b` (`b < a` with `num_val == 1`)
    Less,
    /// Pop two values, push `a <= b` (`b <= a` with `num_val == 1`)
    LessEq,
    Not,
    Neg,
    Len,

    // ===== Scopes =====
    /// Give slots `num_val..num_val2` fresh cells on block entry
    Enter,
    /// Release slots `num_val..num_val2` on block exit
    Leave,
    /// Reset slots `num_val..num_val2` when jumping back to a label
    Clean,

    // ===== Loops =====
    /// Convert the top to a number; `num_val` selects the error (0 initial, 1 limit, 2 step)
    ToNum,
    /// Numeric `for` test over `[limit, step, current]` (current on top); exits to `num_val`
    JFor,
    /// Add the step to the current value of a numeric `for`
    Incr,
    /// Turn the values of a generic `for` into an iterator state tuple
    IterPrep,
    /// Exit to `num_val` when the iterator returned nil, else record the control value
    IterCheck,
}

impl OpCode {
    /// Display name used by the disassembler
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Nop => "NOP",
            OpCode::Literal => "LITERAL",
            OpCode::Pop => "POP",
            OpCode::Copy => "COPY",
            OpCode::Scalar => "SCALAR",
            OpCode::MkTuple => "MKTUPLE",
            OpCode::ExpTuple => "EXPTUPLE",
            OpCode::Local => "LOCAL",
            OpCode::Upvalue => "UPVALUE",
            OpCode::StoreLcl => "STORELCL",
            OpCode::StoreUpv => "STOREUPV",
            OpCode::Index => "INDEX",
            OpCode::IndexSet => "INDEXSET",
            OpCode::Method => "METHOD",
            OpCode::NewTable => "NEWTABLE",
            OpCode::TblInitN => "TBLINITN",
            OpCode::TblInitI => "TBLINITI",
            OpCode::Closure => "CLOSURE",
            OpCode::BeginFn => "BEGINFN",
            OpCode::Call => "CALL",
            OpCode::Ret => "RET",
            OpCode::Jump => "JUMP",
            OpCode::Jf => "JF",
            OpCode::JfOrPop => "JFORPOP",
            OpCode::JtOrPop => "JTORPOP",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Power => "POWER",
            OpCode::Concat => "CONCAT",
            OpCode::Eq => "EQ",
            OpCode::Less => "LESS",
            OpCode::LessEq => "LESSEQ",
            OpCode::Not => "NOT",
            OpCode::Neg => "NEG",
            OpCode::Len => "LEN",
            OpCode::Enter => "ENTER",
            OpCode::Leave => "LEAVE",
            OpCode::Clean => "CLEAN",
            OpCode::ToNum => "TONUM",
            OpCode::JFor => "JFOR",
            OpCode::Incr => "INCR",
            OpCode::IterPrep => "ITERPREP",
            OpCode::IterCheck => "ITERCHECK",
        }
    }

    /// Whether `num_val` holds a jump target
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            OpCode::Jump
                | OpCode::Jf
                | OpCode::JfOrPop
                | OpCode::JtOrPop
                | OpCode::JFor
                | OpCode::IterCheck
        )
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
