use std::fmt;

/// The language's primitive types.
///
/// The declaration order is also the ranking used to pick the result type of
/// binary operators (`Int < Char < Ptr`). It is a representational convention,
/// not a size ordering.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    Int,
    Char,
    Ptr,
}

impl DataType {
    pub const ALL: &[DataType] = &[DataType::Int, DataType::Char, DataType::Ptr];

    pub fn props(self) -> &'static TypeProps {
        &TYPE_TABLE[self as usize]
    }

    /// Size in bytes.
    pub fn size(self) -> usize {
        self.props().size
    }

    /// The NASM operand size keyword, such as `dword`.
    pub fn asm_size(self) -> &'static str {
        self.props().asm_size
    }

    /// Returns the name of the register `reg` sized to hold this type.
    pub fn reg(self, reg: Reg) -> &'static str {
        self.props().regs[reg as usize]
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataType::Int => "int",
            DataType::Char => "char",
            DataType::Ptr => "ptr",
        })
    }
}

/// Static representation metadata of a [`DataType`].
#[derive(Debug)]
pub struct TypeProps {
    pub size: usize,
    pub asm_size: &'static str,
    /// Indexed by [`Reg`].
    pub regs: [&'static str; 2],
}

/// The two working registers of the evaluator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {
    /// The primary location, which holds every evaluated expression.
    A,
    /// The secondary location, which holds a spilled right operand.
    B,
}

/// Indexed by [`DataType`].
static TYPE_TABLE: [TypeProps; 3] = [
    TypeProps {
        size: 4,
        asm_size: "dword",
        regs: ["eax", "ebx"],
    },
    TypeProps {
        size: 1,
        asm_size: "byte",
        regs: ["al", "bl"],
    },
    TypeProps {
        size: 8,
        asm_size: "qword",
        regs: ["rax", "rbx"],
    },
];

/// The resolved type of an expression. Pointers carry their pointee, when
/// known.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Type {
    pub data: DataType,
    pub pointee: Option<DataType>,
}

impl Type {
    pub const INT: Type = Type::scalar(DataType::Int);
    pub const CHAR: Type = Type::scalar(DataType::Char);

    pub const fn scalar(data: DataType) -> Type {
        Type {
            data,
            pointee: None,
        }
    }

    pub const fn pointer_to(pointee: DataType) -> Type {
        Type {
            data: DataType::Ptr,
            pointee: Some(pointee),
        }
    }

    pub fn is_ptr(self) -> bool {
        self.data == DataType::Ptr
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.data, self.pointee) {
            (DataType::Ptr, Some(pointee)) => write!(f, "{pointee}*"),
            (data, _) => write!(f, "{data}"),
        }
    }
}

/// Whether an expression denotes a storage location or a loaded value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Lvalue,
    Rvalue,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Lvalue => "lvalue",
            Role::Rvalue => "rvalue",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_table() {
        let sizes: Vec<_> = DataType::ALL.iter().map(|ty| ty.size()).collect();
        assert_eq!(sizes, [4, 1, 8]);
        assert_eq!(DataType::Char.asm_size(), "byte");
        assert_eq!(DataType::Int.reg(Reg::B), "ebx");
        assert_eq!(DataType::Ptr.reg(Reg::A), "rax");
    }

    #[test]
    fn ranking() {
        assert!(DataType::Int < DataType::Char);
        assert!(DataType::Char < DataType::Ptr);
    }

    #[test]
    fn display() {
        assert_eq!(Type::pointer_to(DataType::Char).to_string(), "char*");
        assert_eq!(Type::scalar(DataType::Ptr).to_string(), "ptr");
        assert_eq!(Type::INT.to_string(), "int");
    }
}
