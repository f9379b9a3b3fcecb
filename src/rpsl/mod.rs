pub mod lexer;
pub mod object;

pub use lexer::{tokenize_attribute, Token};
pub use object::{AttributeType, ObjectType, RpslAttribute, RpslObject};
