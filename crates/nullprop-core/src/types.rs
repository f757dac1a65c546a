//! Type syntax: the annotatable slot.
//!
//! A [`TypeSyntax`] is a single type occurrence in the program model, such as
//! a parameter type, a return type, or a cast target. Its `nullable` flag is
//! the "may be absent" annotation that passes set.
//!
//! Type syntax is written in text form in model files and parsed with a small
//! grammar:
//!
//! ```text
//! <type>  := <name> ["<" <type> ("," <type>)* ">"] ("[]")* ["?"]
//! <name>  := [A-Za-z0-9_.]+
//! ```
//!
//! Array suffixes are kept as part of the name, so `string[]?` is the name
//! `string[]` with the annotation set.

use std::fmt;

use serde::{Deserialize, Serialize};
use winnow::ascii::multispace0;
use winnow::combinator::{delimited, opt, repeat, separated};
use winnow::prelude::*;
use winnow::token::take_while;
use winnow::ModalResult;

use crate::error::NullpropError;

/// Name used for the absence of a return value.
pub const VOID: &str = "void";

/// One type occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeSyntax {
    /// Type name, including any array suffixes.
    pub name: String,
    /// Generic arguments.
    pub args: Vec<TypeSyntax>,
    /// The "may be absent" annotation.
    pub nullable: bool,
}

impl TypeSyntax {
    /// An unannotated, non-generic type.
    pub fn named(name: impl Into<String>) -> Self {
        TypeSyntax {
            name: name.into(),
            args: Vec::new(),
            nullable: false,
        }
    }

    /// The `void` pseudo-type.
    pub fn void() -> Self {
        TypeSyntax::named(VOID)
    }

    /// Set generic arguments.
    pub fn with_args(mut self, args: Vec<TypeSyntax>) -> Self {
        self.args = args;
        self
    }

    /// Copy of this type with the annotation set.
    pub fn annotated(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Whether this is `void`.
    pub fn is_void(&self) -> bool {
        self.name == VOID
    }

    /// Text form with every annotation removed (used in identity keys).
    pub fn normalized(&self) -> String {
        let mut out = self.name.clone();
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(TypeSyntax::normalized).collect();
            out.push('<');
            out.push_str(&args.join(","));
            out.push('>');
        }
        out
    }

    /// Visit this type and every nested generic argument.
    pub fn for_each<'a>(&'a self, f: &mut dyn FnMut(&'a TypeSyntax)) {
        f(self);
        for arg in &self.args {
            arg.for_each(f);
        }
    }

    /// Parse type syntax from text.
    ///
    /// # Examples
    ///
    /// ```
    /// use nullprop_core::types::TypeSyntax;
    ///
    /// let ty = TypeSyntax::parse("Dictionary<string, List<int>?>").unwrap();
    /// assert_eq!(ty.name, "Dictionary");
    /// assert!(ty.args[1].nullable);
    /// assert!(!ty.nullable);
    /// ```
    pub fn parse(input: &str) -> Result<Self, NullpropError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(NullpropError::InvalidTypeSyntax {
                input: input.to_string(),
                message: "empty type".to_string(),
            });
        }
        parse_type
            .parse(trimmed)
            .map_err(|e| NullpropError::InvalidTypeSyntax {
                input: input.to_string(),
                message: format!("{:?}", e),
            })
    }
}

impl fmt::Display for TypeSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", arg)?;
            }
            f.write_str(">")?;
        }
        if self.nullable {
            f.write_str("?")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for TypeSyntax {
    type Error = NullpropError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypeSyntax::parse(&value)
    }
}

impl From<TypeSyntax> for String {
    fn from(ty: TypeSyntax) -> Self {
        ty.to_string()
    }
}

// ============================================================================
// Parser implementation using winnow
// ============================================================================

/// Parse one type, including generic arguments, array suffixes and annotation.
fn parse_type(input: &mut &str) -> ModalResult<TypeSyntax> {
    let _ = multispace0.parse_next(input)?;

    let name: &str = take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '.')
        .parse_next(input)?;

    let args: Option<Vec<TypeSyntax>> = opt(delimited(
        ('<', multispace0),
        separated(1.., parse_type, (multispace0, ',', multispace0)),
        (multispace0, '>'),
    ))
    .parse_next(input)?;

    let ranks: Vec<&str> = repeat(0.., "[]").parse_next(input)?;
    let nullable = opt('?').parse_next(input)?.is_some();
    let _ = multispace0.parse_next(input)?;

    let mut name = name.to_string();
    for rank in ranks {
        name.push_str(rank);
    }

    Ok(TypeSyntax {
        name,
        args: args.unwrap_or_default(),
        nullable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_and_annotated() {
        let ty = TypeSyntax::parse("string").unwrap();
        assert_eq!(ty, TypeSyntax::named("string"));

        let ty = TypeSyntax::parse("string?").unwrap();
        assert!(ty.nullable);
        assert_eq!(ty.name, "string");
    }

    #[test]
    fn parse_nested_generics() {
        let ty = TypeSyntax::parse("Dictionary<string?, List<int[]>>?").unwrap();
        assert!(ty.nullable);
        assert_eq!(ty.args.len(), 2);
        assert!(ty.args[0].nullable);
        assert_eq!(ty.args[1].name, "List");
        assert_eq!(ty.args[1].args[0].name, "int[]");
        assert_eq!(ty.normalized(), "Dictionary<string,List<int[]>>");
        assert_eq!(ty.to_string(), "Dictionary<string?, List<int[]>>?");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(TypeSyntax::parse("").is_err());
        assert!(TypeSyntax::parse("List<").is_err());
        assert!(TypeSyntax::parse("a b").is_err());
    }

    #[test]
    fn text_form_survives_serde() {
        let ty = TypeSyntax::parse("IEnumerable<T?>").unwrap();
        let json = serde_json::to_string(&ty).unwrap();
        assert_eq!(json, "\"IEnumerable<T?>\"");
        let back: TypeSyntax = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ty);
    }

    #[test]
    fn for_each_visits_nested_arguments() {
        let ty = TypeSyntax::parse("Func<string, Task<int>>").unwrap();
        let mut names = Vec::new();
        ty.for_each(&mut |t| names.push(t.name.clone()));
        assert_eq!(names, vec!["Func", "string", "Task", "int"]);
    }
}
