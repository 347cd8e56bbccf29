//! Static types attached to bindings by the (external) type checker.
//!
//! The lowering stage only needs enough type information to unify sibling
//! pattern variables, to check deconstruction arity, and to decide whether
//! a single-field payload can share its slot with the elision sentinel.

use std::fmt;

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ty {
    Unit,
    Bool,
    Int,
    Str,
    /// Any reference value; admits null.
    Object,
    /// `T?`
    Nullable(Box<Ty>),
    Tuple(Vec<Ty>),
    List(Box<Ty>),
    /// Not known to this stage (error recovery, untyped captures).
    Unknown,
}

impl Ty {
    pub fn nullable(inner: Ty) -> Ty {
        Ty::Nullable(Box::new(inner))
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::List(Box::new(elem))
    }

    /// Whether a value of this type may itself be the null sentinel.
    pub fn admits_null(&self) -> bool {
        matches!(self, Ty::Object | Ty::Nullable(_) | Ty::Unknown)
    }

    /// Positional arity of a composite type, `None` for non-composites.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Ty::Tuple(elems) => Some(elems.len()),
            _ => None,
        }
    }

    /// Type of the `index`-th positional part of a composite.
    pub fn part(&self, index: usize) -> Ty {
        match self {
            Ty::Tuple(elems) => elems.get(index).cloned().unwrap_or(Ty::Unknown),
            _ => Ty::Unknown,
        }
    }

    /// Element type of a sequence.
    pub fn element(&self) -> Ty {
        match self {
            Ty::List(elem) => (**elem).clone(),
            _ => Ty::Unknown,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Unit => write!(f, "()"),
            Ty::Bool => write!(f, "bool"),
            Ty::Int => write!(f, "int"),
            Ty::Str => write!(f, "str"),
            Ty::Object => write!(f, "object"),
            Ty::Nullable(inner) => write!(f, "{inner}?"),
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Ty::List(elem) => write!(f, "[{elem}]"),
            Ty::Unknown => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_admission() {
        assert!(Ty::Object.admits_null());
        assert!(Ty::nullable(Ty::Int).admits_null());
        assert!(!Ty::Int.admits_null());
        assert!(!Ty::Tuple(vec![Ty::Int]).admits_null());
    }

    #[test]
    fn tuple_arity_and_parts() {
        let ty = Ty::Tuple(vec![Ty::Int, Ty::Str]);
        assert_eq!(ty.arity(), Some(2));
        assert_eq!(ty.part(1), Ty::Str);
        assert_eq!(ty.part(5), Ty::Unknown);
        assert_eq!(Ty::Int.arity(), None);
    }

    #[test]
    fn display() {
        let ty = Ty::Tuple(vec![Ty::Int, Ty::nullable(Ty::Str), Ty::list(Ty::Bool)]);
        assert_eq!(ty.to_string(), "(int, str?, [bool])");
    }
}
