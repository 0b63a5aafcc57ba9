//! Type and method descriptors in class-file notation
//!
//! Descriptors are how the front-end names types before they are resolved:
//! `I` for an int, `Ljava/lang/String;` for a class, `[B` for a byte array and
//! `(IJ)V` for a method taking an int and a long and returning nothing.

use std::fmt;

use crate::error::TypeError;

/// A base (primitive) type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseTypeDescriptor {
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `D`
    Double,
    /// `F`
    Float,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `S`
    Short,
    /// `Z`
    Boolean,
    /// `V`
    Void,
}

impl BaseTypeDescriptor {
    /// Descriptor character
    pub fn to_char(self) -> char {
        match self {
            BaseTypeDescriptor::Byte => 'B',
            BaseTypeDescriptor::Char => 'C',
            BaseTypeDescriptor::Double => 'D',
            BaseTypeDescriptor::Float => 'F',
            BaseTypeDescriptor::Int => 'I',
            BaseTypeDescriptor::Long => 'J',
            BaseTypeDescriptor::Short => 'S',
            BaseTypeDescriptor::Boolean => 'Z',
            BaseTypeDescriptor::Void => 'V',
        }
    }

    /// Parse a descriptor character
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'B' => BaseTypeDescriptor::Byte,
            'C' => BaseTypeDescriptor::Char,
            'D' => BaseTypeDescriptor::Double,
            'F' => BaseTypeDescriptor::Float,
            'I' => BaseTypeDescriptor::Int,
            'J' => BaseTypeDescriptor::Long,
            'S' => BaseTypeDescriptor::Short,
            'Z' => BaseTypeDescriptor::Boolean,
            'V' => BaseTypeDescriptor::Void,
            _ => return None,
        })
    }
}

/// A class type descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassTypeDescriptor {
    internal_name: String,
}

impl ClassTypeDescriptor {
    /// Create from an internal name such as `java/lang/String`
    pub fn new(internal_name: impl Into<String>) -> Self {
        ClassTypeDescriptor {
            internal_name: internal_name.into(),
        }
    }

    /// Internal name, e.g. `java/lang/String`
    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    /// Package part of the internal name; empty for the default package
    pub fn package_name(&self) -> &str {
        match self.internal_name.rfind('/') {
            Some(idx) => &self.internal_name[..idx],
            None => "",
        }
    }

    /// Simple class name without the package
    pub fn class_name(&self) -> &str {
        match self.internal_name.rfind('/') {
            Some(idx) => &self.internal_name[idx + 1..],
            None => &self.internal_name,
        }
    }

    /// Descriptor of the nested class `identifier`, e.g. `Stdarg$va_list`
    pub fn nested(&self, identifier: &str) -> ClassTypeDescriptor {
        ClassTypeDescriptor::new(format!("{}${}", self.internal_name, identifier))
    }
}

/// Any field or value type descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// Primitive or void
    Base(BaseTypeDescriptor),
    /// Class or interface
    Class(ClassTypeDescriptor),
    /// Array of the element descriptor
    Array(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// Shorthand for a class descriptor
    pub fn class(internal_name: impl Into<String>) -> Self {
        TypeDescriptor::Class(ClassTypeDescriptor::new(internal_name))
    }

    /// Shorthand for an array of `element`
    pub fn array_of(element: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(element))
    }

    /// Parse a complete type descriptor
    pub fn parse(descriptor: &str) -> Result<Self, TypeError> {
        let mut parser = Parser::new(descriptor);
        let ty = parser.type_descriptor()?;
        parser.finish()?;
        Ok(ty)
    }
}

impl From<BaseTypeDescriptor> for TypeDescriptor {
    fn from(base: BaseTypeDescriptor) -> Self {
        TypeDescriptor::Base(base)
    }
}

impl From<ClassTypeDescriptor> for TypeDescriptor {
    fn from(class: ClassTypeDescriptor) -> Self {
        TypeDescriptor::Class(class)
    }
}

/// A method descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Parameter descriptors
    pub parameters: Vec<TypeDescriptor>,
    /// Return descriptor
    pub return_type: TypeDescriptor,
}

impl MethodDescriptor {
    /// Create a method descriptor
    pub fn new(parameters: Vec<TypeDescriptor>, return_type: TypeDescriptor) -> Self {
        MethodDescriptor {
            parameters,
            return_type,
        }
    }

    /// `()V`
    pub fn void() -> Self {
        MethodDescriptor::new(Vec::new(), BaseTypeDescriptor::Void.into())
    }

    /// Parse a method descriptor such as `(ILjava/lang/String;)V`
    pub fn parse(descriptor: &str) -> Result<Self, TypeError> {
        let mut parser = Parser::new(descriptor);
        parser.expect('(')?;
        let mut parameters = Vec::new();
        while parser.peek() != Some(')') {
            parameters.push(parser.type_descriptor()?);
        }
        parser.expect(')')?;
        let return_type = parser.type_descriptor()?;
        parser.finish()?;
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Parser { text, pos: 0 }
    }

    fn error(&self) -> TypeError {
        TypeError::InvalidDescriptor {
            descriptor: self.text.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), TypeError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            _ => Err(self.error()),
        }
    }

    fn finish(&self) -> Result<(), TypeError> {
        if self.pos == self.text.len() {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn type_descriptor(&mut self) -> Result<TypeDescriptor, TypeError> {
        match self.bump() {
            Some('L') => {
                let text = self.text;
                let rest = &text[self.pos..];
                let end = rest.find(';').ok_or_else(|| self.error())?;
                if end == 0 {
                    return Err(self.error());
                }
                let name = rest[..end].to_string();
                self.pos += end + 1;
                Ok(TypeDescriptor::class(name))
            }
            Some('[') => Ok(TypeDescriptor::array_of(self.type_descriptor()?)),
            Some(c) => BaseTypeDescriptor::from_char(c)
                .map(TypeDescriptor::Base)
                .ok_or_else(|| self.error()),
            None => Err(self.error()),
        }
    }
}

impl fmt::Display for BaseTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

impl fmt::Display for ClassTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{};", self.internal_name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Base(b) => write!(f, "{}", b),
            TypeDescriptor::Class(c) => write!(f, "{}", c),
            TypeDescriptor::Array(e) => write!(f, "[{}", e),
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.parameters {
            write!(f, "{}", param)?;
        }
        write!(f, "){}", self.return_type)
    }
}
