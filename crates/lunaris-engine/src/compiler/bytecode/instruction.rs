//! A single bytecode instruction

use std::sync::Arc;

use crate::compiler::bytecode::OpCode;
use crate::error::SourceRef;
use crate::parser::SymbolRef;
use crate::vm::DynValue;

/// Marker for a jump whose target is not known yet
pub const UNRESOLVED: i32 = -1;

/// One instruction. Clones are cheap: payloads are reference counted.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: OpCode,
    pub num_val: i32,
    pub num_val2: i32,
    pub value: Option<DynValue>,
    pub symbol: Option<SymbolRef>,
    pub symbols: Option<Arc<[SymbolRef]>>,
    pub name: Option<Arc<str>>,
    /// Source position reported by errors raised here
    pub source: Option<SourceRef>,
}

impl Instruction {
    pub fn new(op: OpCode) -> Self {
        Self {
            op,
            num_val: 0,
            num_val2: 0,
            value: None,
            symbol: None,
            symbols: None,
            name: None,
            source: None,
        }
    }

    pub fn with_num(mut self, num_val: i32) -> Self {
        self.num_val = num_val;
        self
    }

    pub fn with_num2(mut self, num_val2: i32) -> Self {
        self.num_val2 = num_val2;
        self
    }

    pub fn with_value(mut self, value: DynValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_symbol(mut self, symbol: SymbolRef) -> Self {
        self.symbol = Some(symbol);
        self
    }

    pub fn with_symbols(mut self, symbols: Vec<SymbolRef>) -> Self {
        self.symbols = Some(Arc::from(symbols));
        self
    }

    pub fn with_name(mut self, name: Option<Arc<str>>) -> Self {
        self.name = name;
        self
    }

    pub fn with_source(mut self, source: Option<SourceRef>) -> Self {
        self.source = source;
        self
    }

    /// Jump target, if this is a resolved jump
    pub fn jump_target(&self) -> Option<usize> {
        (self.op.is_jump() && self.num_val >= 0).then_some(self.num_val as usize)
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<10}", self.op.name())?;
        match self.op {
            OpCode::Literal => {
                let value = self.value.clone().unwrap_or_default();
                match value {
                    DynValue::String(s) => write!(f, "{:?}", s),
                    other => write!(f, "{}", other),
                }
            }
            OpCode::StoreLcl | OpCode::StoreUpv => {
                let target = self.symbol.as_ref().map(|s| s.describe()).unwrap_or_default();
                write!(f, "{} <- [{}:{}]", target, self.num_val, self.num_val2)
            }
            OpCode::Closure | OpCode::BeginFn => {
                let names: Vec<&str> = self
                    .symbols
                    .iter()
                    .flat_map(|s| s.iter())
                    .map(|s| s.name())
                    .collect();
                write!(f, "{} ({})", self.num_val, names.join(", "))?;
                if let Some(name) = &self.name {
                    write!(f, " {}", name)?;
                }
                Ok(())
            }
            OpCode::Index | OpCode::Method | OpCode::Call => {
                write!(f, "{}", self.num_val)?;
                if self.op == OpCode::Call && self.num_val2 == 1 {
                    write!(f, " tail")?;
                }
                if let Some(name) = &self.name {
                    write!(f, " ; {}", name)?;
                }
                Ok(())
            }
            OpCode::Nop
            | OpCode::NewTable
            | OpCode::Scalar
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Power
            | OpCode::Concat
            | OpCode::Eq
            | OpCode::Not
            | OpCode::Neg
            | OpCode::Len
            | OpCode::Incr
            | OpCode::IterPrep
            | OpCode::TblInitN => Ok(()),
            _ if self.num_val2 != 0 => write!(f, "{} {}", self.num_val, self.num_val2),
            _ => write!(f, "{}", self.num_val),
        }
    }
}
