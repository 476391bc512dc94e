//! Member descriptors: pure data describing a generated function and its
//! arguments. Descriptors only know how to render their own declaration text.

use super::Dialect;
use std::fmt;

/// Primitive value types understood by both emitted dialects and the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rust types with a direct [`ValueType`] counterpart.
pub trait HasValueType {
    const VALUE_TYPE: ValueType;
}

impl HasValueType for i32 {
    const VALUE_TYPE: ValueType = ValueType::I32;
}

impl HasValueType for u32 {
    const VALUE_TYPE: ValueType = ValueType::I32;
}

impl HasValueType for i64 {
    const VALUE_TYPE: ValueType = ValueType::I64;
}

impl HasValueType for u64 {
    const VALUE_TYPE: ValueType = ValueType::I64;
}

impl HasValueType for f32 {
    const VALUE_TYPE: ValueType = ValueType::F32;
}

impl HasValueType for f64 {
    const VALUE_TYPE: ValueType = ValueType::F64;
}

/// A type in a declaration: either a known value type or a raw type name
/// that is emitted verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Value(ValueType),
    Named(String),
}

impl TypeRef {
    pub fn of<T: HasValueType>() -> Self {
        TypeRef::Value(T::VALUE_TYPE)
    }

    pub fn render(&self) -> &str {
        match self {
            TypeRef::Value(value) => value.as_str(),
            TypeRef::Named(name) => name,
        }
    }
}

impl From<ValueType> for TypeRef {
    fn from(value: ValueType) -> Self {
        TypeRef::Value(value)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Named(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Named(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberAccess {
    #[default]
    Public,
    Private,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDef {
    pub name: String,
    pub ty: TypeRef,
}

impl ArgDef {
    pub fn new(name: &str, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.into(),
        }
    }

    fn render(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::Rust => format!("{}: {}", self.name, self.ty.render()),
            Dialect::Wat => format!("(param ${} {})", self.name, self.ty.render()),
        }
    }
}

/// Fluent description of a generated function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    name: String,
    access: MemberAccess,
    returns: Option<TypeRef>,
    args: Vec<ArgDef>,
}

impl MethodDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            access: MemberAccess::Public,
            returns: None,
            args: Vec::new(),
        }
    }

    pub fn returns(mut self, ty: impl Into<TypeRef>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    pub fn returns_type<T: HasValueType>(self) -> Self {
        self.returns(TypeRef::of::<T>())
    }

    pub fn with_arg(mut self, name: &str, ty: impl Into<TypeRef>) -> Self {
        self.args.push(ArgDef::new(name, ty));
        self
    }

    pub fn with_arg_of<T: HasValueType>(self, name: &str) -> Self {
        self.with_arg(name, TypeRef::of::<T>())
    }

    pub fn with_access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> MemberAccess {
        self.access
    }

    pub fn return_type(&self) -> Option<&TypeRef> {
        self.returns.as_ref()
    }

    pub fn args(&self) -> &[ArgDef] {
        &self.args
    }

    /// Declaration lines for `dialect`, without the block opener.
    pub fn declaration(&self, dialect: Dialect) -> Vec<String> {
        match dialect {
            Dialect::Rust => self.rust_declaration(),
            Dialect::Wat => vec![self.wat_declaration()],
        }
    }

    fn rust_declaration(&self) -> Vec<String> {
        let args = self
            .args
            .iter()
            .map(|arg| arg.render(Dialect::Rust))
            .collect::<Vec<_>>()
            .join(", ");
        let returns = match &self.returns {
            Some(ty) => format!(" -> {}", ty.render()),
            None => String::new(),
        };

        match self.access {
            MemberAccess::Public => vec![
                "#[no_mangle]".to_string(),
                format!("pub extern \"C\" fn {}({}){}", self.name, args, returns),
            ],
            MemberAccess::Internal => {
                vec![format!("pub(crate) fn {}({}){}", self.name, args, returns)]
            }
            MemberAccess::Private => vec![format!("fn {}({}){}", self.name, args, returns)],
        }
    }

    fn wat_declaration(&self) -> String {
        let mut line = format!("(func ${}", self.name);
        if self.access == MemberAccess::Public {
            line.push_str(&format!(" (export \"{}\")", self.name));
        }
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.render(Dialect::Wat));
        }
        if let Some(ty) = &self.returns {
            line.push_str(&format!(" (result {})", ty.render()));
        }
        line
    }
}
