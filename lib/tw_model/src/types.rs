//! JVM typing informations data structures.

use crate::errors::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// A JVM primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrimType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl fmt::Display for PrimType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        };
        write!(f, "{c}")
    }
}

/// A JVM type, in descriptor terms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    Prim(PrimType),
    Class(String),
    Array(Box<Type>),
}

impl Type {
    /// Returns `true` for class and array types, i.e. the types whose
    /// values live on the heap and can alias.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Class(_) | Self::Array(_))
    }

    #[inline]
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// The element type of an array type.
    #[must_use]
    pub fn elem_type(&self) -> Option<&Type> {
        match self {
            Self::Array(t) => Some(t),
            _ => None,
        }
    }

    /// The class name of a class type.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Class(cl) => Some(cl),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Void => write!(f, "V"),
            Self::Prim(p) => p.fmt(f),
            Self::Class(cl) => write!(f, "L{cl};"),
            Self::Array(t) => write!(f, "[{t}"),
        }
    }
}

impl TryFrom<&str> for Type {
    type Error = ModelError;

    fn try_from(descriptor: &str) -> ModelResult<Self> {
        let (typ, rest) = parse_type(descriptor)?;
        if rest.is_empty() {
            Ok(typ)
        } else {
            Err(ModelError::InvalidDescriptor(descriptor.to_string()))
        }
    }
}

fn parse_type(descriptor: &str) -> ModelResult<(Type, &str)> {
    let mut chars = descriptor.chars();
    let invalid = || ModelError::InvalidDescriptor(descriptor.to_string());
    match chars.next().ok_or_else(invalid)? {
        'V' => Ok((Type::Void, chars.as_str())),
        'Z' => Ok((Type::Prim(PrimType::Boolean), chars.as_str())),
        'B' => Ok((Type::Prim(PrimType::Byte), chars.as_str())),
        'C' => Ok((Type::Prim(PrimType::Char), chars.as_str())),
        'S' => Ok((Type::Prim(PrimType::Short), chars.as_str())),
        'I' => Ok((Type::Prim(PrimType::Int), chars.as_str())),
        'J' => Ok((Type::Prim(PrimType::Long), chars.as_str())),
        'F' => Ok((Type::Prim(PrimType::Float), chars.as_str())),
        'D' => Ok((Type::Prim(PrimType::Double), chars.as_str())),
        'L' => {
            let rest = chars.as_str();
            let end = rest.find(';').ok_or_else(invalid)?;
            Ok((Type::Class(rest[..end].to_string()), &rest[end + 1..]))
        }
        '[' => {
            let (elem, rest) = parse_type(chars.as_str())?;
            if elem.is_void() {
                return Err(invalid());
            }
            Ok((Type::Array(Box::new(elem)), rest))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_roundtrip() {
        for descr in ["V", "I", "Ljava/lang/Object;", "[I", "[[Ljava/lang/String;"] {
            let typ = Type::try_from(descr).unwrap();
            assert_eq!(format!("{typ}"), descr);
        }
    }

    #[test]
    fn invalid_descriptors_are_rejected() {
        assert!(Type::try_from("Ljava/lang/Object").is_err());
        assert!(Type::try_from("[V").is_err());
        assert!(Type::try_from("II").is_err());
        assert!(Type::try_from("Q").is_err());
    }

    #[test]
    fn reference_types() {
        assert!(Type::try_from("Ljava/lang/Object;").unwrap().is_reference());
        assert!(Type::try_from("[I").unwrap().is_reference());
        assert!(!Type::try_from("I").unwrap().is_reference());
        assert!(!Type::Void.is_reference());
    }
}
