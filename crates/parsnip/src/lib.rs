//! Parsnip: packrat PEG parsing with grammars written in a compact rule
//! syntax.
//!
//! A grammar is compiled from EBNF-flavored text into an expression graph;
//! parsing an input with it yields a concrete parse tree, which a
//! [`NodeVisitor`] can fold into any value.
//!
//! # Example
//!
//! ```
//! use parsnip::Grammar;
//!
//! let grammar = Grammar::new(r#"
//!     bold_text  = bold_open text bold_close
//!     text       = ~"[A-Z 0-9]*"i
//!     bold_open  = "(("
//!     bold_close = "))"
//! "#)
//! .expect("valid grammar");
//!
//! let tree = grammar.parse("((bold stuff))").expect("input matches");
//! assert_eq!(tree.children()[1].text(), "bold stuff");
//! ```
//!
//! Matching is packrat: every (expression, position) outcome is memoized
//! for the duration of one parse call, making worst-case time linear in the
//! input. Alternation is ordered and repetition is greedy; there is no
//! backtracking across a committed choice and no left-recursion support.

pub mod error;
pub mod grammar;
pub mod node;
pub mod visitor;

mod expr;
mod matcher;

#[cfg(test)]
mod lib_tests;
#[cfg(test)]
mod matcher_tests;

pub use error::{ErrorPrinter, GrammarError, ParseError, ParseErrorKind};
pub use grammar::{Grammar, RuleRef};
pub use node::Node;
pub use visitor::{HandlerError, NodeVisitor, VisitationError};
