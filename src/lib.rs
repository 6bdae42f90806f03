//! Early-bootstrap elaborator for Lean-style surface syntax.
//!
//! This crate takes parsed commands (`def`, `namespace`, `notation`,
//! `#check`, ...) and elaborates them into a stream of core commands over
//! pre-expressions: terms in which every identifier has been resolved
//! against the open namespaces, with metavariables standing in for
//! everything type inference will fill in later. It covers the stages of
//! the pipeline that run before unification:
//!
//! * [`syntax`]: the parsed command and term trees and their kinds;
//! * [`elab::resolve`]: namespaces, sections, `open`, section variables,
//!   and identifier resolution;
//! * [`elab::pexpr`]: lowering surface terms to the pre-expressions
//!   of [`expr`];
//! * [`elab::notation`] and [`grammar`]: notation declaration, matching
//!   against reservations, and the parser configuration they update;
//! * [`elab`]: the per-command handlers and the driver that runs a
//!   command stream to completion under fuel and recursion bounds.
//!
//! The parser itself is not here: an [`elab::CommandSource`] hands the
//! driver one parsed command at a time, receiving the current
//! [`ParserConfig`] so freshly declared notation can inform the parse of
//! the commands that follow.

// rust lints we want
#![warn(bare_trait_objects, elided_lifetimes_in_paths,
  missing_copy_implementations, missing_debug_implementations, future_incompatible,
  rust_2018_idioms, trivial_numeric_casts, variant_size_differences, unreachable_pub,
  unused, missing_docs)]
// all the clippy
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
// all the clippy::restriction lints we want
#![warn(clippy::float_arithmetic,
  clippy::get_unwrap, clippy::inline_asm_x86_att_syntax, clippy::integer_division,
  clippy::rc_buffer, clippy::rest_pat_in_fully_bound_structs,
  clippy::string_add, clippy::unwrap_used)]
// all the clippy lints we don't want
#![allow(clippy::cognitive_complexity, clippy::comparison_chain,
  clippy::default_trait_access, clippy::enum_glob_use, clippy::inline_always,
  clippy::manual_map, clippy::map_err_ignore, clippy::missing_const_for_fn,
  clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::module_name_repetitions,
  clippy::multiple_crate_versions, clippy::option_if_let_else, clippy::redundant_pub_crate,
  clippy::semicolon_if_nothing_returned, clippy::shadow_unrelated, clippy::too_many_lines,
  clippy::use_self)]

pub mod util;
pub mod name;
pub mod rbmap;
pub mod lined_string;
pub mod message;
pub mod syntax;
pub mod expr;
pub mod grammar;
pub mod env;
pub mod elab;

pub use elab::{CommandSource, ElabError, Elaborator, Result, SyntaxStream};
pub use env::{
  CoreCommand, DefKind, DefsCommand, Environment, ExportDecl, Modifiers, OpenDecl, OptionValue,
  Options,
};
pub use expr::{BinderInfo, Expr, ExprKind, KvMap, KvValue, Level, LevelKind, Literal};
pub use grammar::{NotationItem, NotationRule, ParserConfig, Prec, TokenTable};
pub use lined_string::LinedString;
pub use message::{ErrorLevel, Message, MessageLog};
pub use name::{Name, NameGen, NameKind};
pub use rbmap::{RbMap, RbSet};
pub use syntax::{Atom, BuiltinKind, Ident, NotationId, Syntax, SyntaxKind, SyntaxNode};
pub use util::*;
