//! `to_pexpr`: surface syntax to pre-expressions.
//!
//! [`ExprBuilder`] is a bottom-up structural recursion over term syntax.
//! Each case elaborates its children, assembles the corresponding
//! pre-expression, and wraps it in positional metadata when the node
//! carries a source span. Identifier leaves consult the candidate lists
//! attached by [`preresolve`](crate::elab::resolve::ScopeState::preresolve):
//! no candidates embeds the name as an unresolved constant for the
//! downstream pass to report, one candidate becomes a direct constant
//! reference, and several become a `choice` node.
//!
//! `match` is not desugared here. Scrutinee, patterns and arm bodies are
//! elaborated as plain terms and the result is tagged through metadata for
//! a later macro-expansion pass, so pattern variables come out as
//! unresolved constants by design.
//!
//! Malformed node shapes are command-fatal: they indicate a parser bug,
//! not user error, and recovery would only smear the damage around.

use crate::elab::notation::NotationTable;
use crate::elab::resolve::{root_name, ScopeState};
use crate::elab::{ElabError, Result};
use crate::syntax::{BuiltinKind, Ident, SyntaxKind, SyntaxNode};
use crate::{BinderInfo, Expr, KvMap, Level, LinedString, Name, NameGen, Span, Syntax};
use if_chain::if_chain;
use num::BigUint;

/// Metadata keys attached by the expression builder.
pub mod keys {
  use crate::Name;
  use once_cell::sync::Lazy;

  macro_rules! keys {
    ($($(#[$doc:meta])* $name:ident: $s:literal;)*) => {
      $($(#[$doc])* pub static $name: Lazy<Name> = Lazy::new(|| Name::simple($s));)*
    }
  }

  keys! {
    /// 1-based source line of the annotated node.
    ROW: "row";
    /// 0-based source column of the annotated node.
    COLUMN: "column";
    /// `false` on a constant whose identifier had no resolution candidates.
    PRERESOLVED: "preresolved";
    /// The number of alternatives under a `choice` node.
    CHOICE: "choice";
    /// The projected field (name or index), or the field of a structure
    /// instance item.
    FIELD: "field";
    /// Marks an application spine as a captured `match`.
    MATCH: "match";
    /// The number of patterns of a captured match arm.
    MATCH_ARM: "match_arm";
    /// Marks an anonymous constructor application.
    ANON_CTOR: "anonymous_constructor";
    /// Marks a structure instance literal.
    STRUCT_INST: "structure_instance";
    /// The named structure of a structure instance, when one was written.
    STRUCT: "struct";
    /// The number of field items of a structure instance.
    FIELDS: "fields";
    /// The number of `..e` sources of a structure instance.
    SOURCES: "sources";
    /// Marks an `@f` explicit-application head.
    EXPLICIT: "explicit";
    /// Marks a `@&e` borrowed term.
    BORROWED: "borrowed";
    /// Marks a `.(e)` inaccessible pattern.
    INACCESSIBLE: "inaccessible";
  }
}

/// The binder annotation a binder-group node kind denotes.
pub(crate) fn binder_info(kind: SyntaxKind) -> Option<BinderInfo> {
  match kind {
    SyntaxKind::Builtin(BuiltinKind::BinderExplicit) => Some(BinderInfo::Default),
    SyntaxKind::Builtin(BuiltinKind::BinderImplicit) => Some(BinderInfo::Implicit),
    SyntaxKind::Builtin(BuiltinKind::BinderInstImplicit) => Some(BinderInfo::InstImplicit),
    SyntaxKind::Builtin(BuiltinKind::BinderStrictImplicit) => Some(BinderInfo::StrictImplicit),
    _ => None,
  }
}

/// One elaborated binder of a telescope.
#[derive(Clone, Debug)]
pub struct Binder {
  /// Where the binder was written.
  pub pos: Option<Span>,
  /// The binder annotation.
  pub info: BinderInfo,
  /// The bound name.
  pub name: Name,
  /// The elaborated domain.
  pub ty: Expr,
}

/// The state threaded through one term elaboration. Borrows the pieces of
/// elaborator state it reads; `locals` is the stack of bound names in
/// scope, innermost last.
#[derive(Debug)]
pub struct ExprBuilder<'a> {
  file: &'a LinedString,
  scopes: &'a ScopeState,
  notations: &'a NotationTable,
  ngen: &'a mut NameGen,
  /// Error position for syntax with no span of its own.
  fallback: Span,
  locals: Vec<Name>,
}

impl<'a> ExprBuilder<'a> {
  /// Creates a builder with an empty local context.
  pub fn new(
    file: &'a LinedString,
    scopes: &'a ScopeState,
    notations: &'a NotationTable,
    ngen: &'a mut NameGen,
    fallback: Span,
  ) -> Self {
    ExprBuilder { file, scopes, notations, ngen, fallback, locals: vec![] }
  }

  /// Pushes a bound name onto the local context.
  pub fn push_local(&mut self, name: Name) { self.locals.push(name) }

  /// The current local context depth, for later [`truncate_locals`](Self::truncate_locals).
  #[must_use]
  pub fn locals_mark(&self) -> usize { self.locals.len() }

  /// Drops locals pushed since `mark`.
  pub fn truncate_locals(&mut self, mark: usize) { self.locals.truncate(mark) }

  /// A hole, as an expression.
  pub(crate) fn fresh_mvar(&mut self) -> Expr { Expr::mvar(self.ngen.fresh()) }

  /// A hole, as a universe level.
  pub(crate) fn fresh_level(&mut self) -> Level { Level::mvar(self.ngen.fresh()) }

  fn err(&self, stx: &Syntax, msg: impl Into<crate::util::BoxError>) -> ElabError {
    ElabError::new_e(stx.get_pos().unwrap_or(self.fallback), msg)
  }

  fn ill(&self, stx: &Syntax, what: &str) -> ElabError {
    self.err(stx, format!("ill-formed {what}"))
  }

  /// Wraps `e` in row/column metadata when the syntax had a position.
  fn annot(&self, span: Option<Span>, e: Expr) -> Expr {
    let Some(span) = span else { return e };
    let pos = self.file.to_pos(span.start);
    let kv = KvMap::new()
      .set_nat(keys::ROW.clone(), pos.line + 1)
      .set_nat(keys::COLUMN.clone(), pos.character);
    Expr::mdata(kv, e)
  }

  /// Elaborates a term to a pre-expression.
  pub fn to_pexpr(&mut self, stx: &Syntax) -> Result<Expr> {
    match stx {
      // a parse hole from error recovery elaborates to a fresh hole
      Syntax::Missing => Ok(self.fresh_mvar()),
      Syntax::Atom(_) => Err(self.ill(stx, "term")),
      Syntax::Ident(i) => {
        let e = self.ident_expr(stx, i, vec![])?;
        Ok(self.annot(i.span, e))
      }
      Syntax::Node(n) => {
        let e = self.node_expr(stx, n)?;
        Ok(self.annot(n.span, e))
      }
    }
  }

  fn node_expr(&mut self, stx: &Syntax, n: &SyntaxNode) -> Result<Expr> {
    let SyntaxKind::Builtin(kind) = n.kind else { return self.expand_notation(stx, n) };
    match kind {
      BuiltinKind::App => match n.args.split_first() {
        None => Err(self.ill(stx, "application")),
        Some((f, rest)) => {
          let f = self.to_pexpr(f)?;
          let args =
            rest.iter().map(|a| self.to_pexpr(a)).collect::<Result<Vec<_>>>()?;
          Ok(Expr::apps(f, args))
        }
      },
      BuiltinKind::Lambda => self.lambda_like(stx, n, false),
      BuiltinKind::Pi => self.lambda_like(stx, n, true),
      BuiltinKind::Arrow => {
        let [dom, cod] = &*n.args else { return Err(self.ill(stx, "arrow")) };
        let dom = self.to_pexpr(dom)?;
        let cod = self.to_pexpr(cod)?;
        Ok(Expr::pi(BinderInfo::Default, Name::anon(), dom, cod))
      }
      BuiltinKind::Let => self.let_expr(stx, n),
      BuiltinKind::Have => self.have_expr(stx, n),
      BuiltinKind::Show => {
        let [ty, e] = &*n.args else { return Err(self.ill(stx, "show")) };
        self.ascribe(ty, e)
      }
      BuiltinKind::TypeAscription => {
        let [e, ty] = &*n.args else { return Err(self.ill(stx, "type ascription")) };
        self.ascribe(ty, e)
      }
      BuiltinKind::Sort => self.sort_expr(stx, n),
      BuiltinKind::Number => Ok(Expr::nat(self.numeral(stx, n)?)),
      BuiltinKind::StrLit => {
        if_chain! {
          if let [arg] = &*n.args;
          if let Some(a) = arg.as_atom();
          then { Ok(Expr::str(a.val.as_str())) }
          else { Err(self.ill(stx, "string literal")) }
        }
      }
      BuiltinKind::Hole => Ok(self.fresh_mvar()),
      BuiltinKind::Paren => {
        let [inner] = &*n.args else { return Err(self.ill(stx, "parenthesized term")) };
        self.to_pexpr(inner)
      }
      BuiltinKind::AnonCtor => {
        let args =
          n.args.iter().map(|a| self.to_pexpr(a)).collect::<Result<Vec<_>>>()?;
        let kv = KvMap::new().set_bool(keys::ANON_CTOR.clone(), true);
        Ok(Expr::mdata(kv, Expr::apps(self.fresh_mvar(), args)))
      }
      BuiltinKind::StructInst => self.struct_inst(stx, n),
      BuiltinKind::Match => self.match_expr(stx, n),
      BuiltinKind::Proj => self.proj_expr(stx, n),
      BuiltinKind::Explicit => {
        let [inner] = &*n.args else { return Err(self.ill(stx, "explicit marker")) };
        let e = self.to_pexpr(inner)?;
        Ok(Expr::mdata(KvMap::new().set_bool(keys::EXPLICIT.clone(), true), e))
      }
      BuiltinKind::Borrowed => {
        let [inner] = &*n.args else { return Err(self.ill(stx, "borrowed marker")) };
        let e = self.to_pexpr(inner)?;
        Ok(Expr::mdata(KvMap::new().set_bool(keys::BORROWED.clone(), true), e))
      }
      BuiltinKind::Inaccessible => {
        let [inner] = &*n.args else { return Err(self.ill(stx, "inaccessible pattern")) };
        let e = self.to_pexpr(inner)?;
        Ok(Expr::mdata(KvMap::new().set_bool(keys::INACCESSIBLE.clone(), true), e))
      }
      BuiltinKind::Choice => {
        if n.args.len() < 2 {
          return Err(self.ill(stx, "choice"))
        }
        let alts =
          n.args.iter().map(|a| self.to_pexpr(a)).collect::<Result<Vec<_>>>()?;
        let kv = KvMap::new().set_nat(keys::CHOICE.clone(), alts.len());
        Ok(Expr::mdata(kv, Expr::choice(alts)))
      }
      BuiltinKind::IdentUnivs => {
        let Some((id, levels)) = n.args.split_first() else {
          return Err(self.ill(stx, "universe application"))
        };
        let Some(i) = id.as_ident() else { return Err(self.ill(stx, "universe application")) };
        let levels =
          levels.iter().map(|l| self.to_level(l)).collect::<Result<Vec<_>>>()?;
        self.ident_expr(stx, i, levels)
      }
      _ => Err(self.ill(stx, "term")),
    }
  }

  /// Elaborates a node of a minted notation kind by expanding its
  /// registered template and recursing into the result.
  fn expand_notation(&mut self, stx: &Syntax, n: &SyntaxNode) -> Result<Expr> {
    let SyntaxKind::Notation(id) = n.kind else { return Err(self.ill(stx, "term")) };
    let name = id.name();
    let expanded = match self.notations.get(&name) {
      None => return Err(self.err(stx, format!("notation '{name}' has not been defined"))),
      Some(exp) => exp
        .expand(&n.args)
        .ok_or_else(|| self.err(stx, format!("ill-formed application of notation '{name}'")))?,
    };
    self.to_pexpr(&expanded)
  }

  /// Resolves an identifier occurrence. A name bound by an enclosing
  /// binder is a local; otherwise the preresolved candidate list decides
  /// between an unresolved constant, a direct reference, and a choice.
  fn ident_expr(&mut self, stx: &Syntax, i: &Ident, levels: Vec<Level>) -> Result<Expr> {
    if self.locals.iter().rev().any(|l| *l == i.name) {
      if !levels.is_empty() {
        return Err(self.err(stx, "universe levels are not allowed on a local"))
      }
      return Ok(Expr::local(i.name.clone()))
    }
    match &*i.preresolved {
      [] => {
        let kv = KvMap::new().set_bool(keys::PRERESOLVED.clone(), false);
        Ok(Expr::mdata(kv, Expr::const_(root_name(&i.name), levels)))
      }
      [c] => Ok(Expr::const_(c.clone(), levels)),
      cands => {
        let alts = cands.iter().map(|c| Expr::const_(c.clone(), levels.clone())).collect();
        let kv = KvMap::new().set_nat(keys::CHOICE.clone(), cands.len());
        Ok(Expr::mdata(kv, Expr::choice(alts)))
      }
    }
  }

  fn lambda_like(&mut self, stx: &Syntax, n: &SyntaxNode, is_pi: bool) -> Result<Expr> {
    let Some((body_stx, groups)) = n.args.split_last() else {
      return Err(self.ill(stx, if is_pi { "pi" } else { "lambda" }))
    };
    if groups.is_empty() {
      return Err(self.ill(stx, if is_pi { "pi" } else { "lambda" }))
    }
    let mark = self.locals_mark();
    let mut binders = vec![];
    for g in groups {
      match self.binder_group(g) {
        Ok(bs) => binders.extend(bs),
        Err(e) => {
          self.truncate_locals(mark);
          return Err(e)
        }
      }
    }
    let body = self.to_pexpr(body_stx);
    self.truncate_locals(mark);
    Ok(Self::bind_telescope(binders, body?, is_pi))
  }

  /// Folds a binder telescope around `body`, innermost binder last.
  pub fn bind_telescope(binders: Vec<Binder>, body: Expr, is_pi: bool) -> Expr {
    binders.into_iter().rev().fold(body, |body, b| {
      if is_pi {
        Expr::pi(b.info, b.name, b.ty, body)
      } else {
        Expr::lam(b.info, b.name, b.ty, body)
      }
    })
  }

  /// Elaborates one binder-group node, pushing each bound name onto the
  /// local context so later groups and the body can refer to it. The
  /// group's type is elaborated once, before any of its names are bound.
  pub fn binder_group(&mut self, stx: &Syntax) -> Result<Vec<Binder>> {
    let Some(n) = stx.as_node() else { return Err(self.ill(stx, "binder")) };
    let Some(info) = binder_info(n.kind) else { return Err(self.ill(stx, "binder")) };
    let mut idents = vec![];
    let mut args = n.args.iter().peekable();
    while let Some(i) = args.peek().and_then(|a| a.as_ident()) {
      idents.push(i);
      args.next();
    }
    let ty = match args.next() {
      None => self.fresh_mvar(),
      Some(t) => {
        let Some(asc) = t.as_kind(BuiltinKind::TypeAscription) else {
          return Err(self.ill(stx, "binder"))
        };
        let [ty] = &*asc.args else { return Err(self.ill(stx, "binder")) };
        if args.next().is_some() {
          return Err(self.ill(stx, "binder"))
        }
        self.to_pexpr(ty)?
      }
    };
    // an instance binder may leave its name off entirely
    if idents.is_empty() && info != BinderInfo::InstImplicit {
      return Err(self.ill(stx, "binder"))
    }
    let mut out = vec![];
    if idents.is_empty() {
      let name = self.ngen.fresh();
      self.push_local(name.clone());
      out.push(Binder { pos: n.span, info, name, ty });
    } else {
      for i in idents {
        self.push_local(i.name.clone());
        out.push(Binder { pos: i.span, info, name: i.name.clone(), ty: ty.clone() });
      }
    }
    Ok(out)
  }

  fn let_expr(&mut self, stx: &Syntax, n: &SyntaxNode) -> Result<Expr> {
    let (name, ty, value, body) = match &*n.args {
      [id, value, body] => {
        let Some(i) = id.as_ident() else { return Err(self.ill(stx, "let")) };
        (i.name.clone(), self.fresh_mvar(), value, body)
      }
      [id, asc, value, body] => {
        if_chain! {
          if let Some(i) = id.as_ident();
          if let Some(asc) = asc.as_kind(BuiltinKind::TypeAscription);
          if let [ty] = &*asc.args;
          then { (i.name.clone(), self.to_pexpr(ty)?, value, body) }
          else { return Err(self.ill(stx, "let")) }
        }
      }
      _ => return Err(self.ill(stx, "let")),
    };
    let value = self.to_pexpr(value)?;
    self.push_local(name.clone());
    let body = self.to_pexpr(body);
    self.locals.pop();
    Ok(Expr::let_(name, ty, value, body?))
  }

  fn have_expr(&mut self, stx: &Syntax, n: &SyntaxNode) -> Result<Expr> {
    let (name, ty, proof, body) = match &*n.args {
      [ty, proof, body] => (Name::simple("this"), ty, proof, body),
      [id, ty, proof, body] => {
        let Some(i) = id.as_ident() else { return Err(self.ill(stx, "have")) };
        (i.name.clone(), ty, proof, body)
      }
      _ => return Err(self.ill(stx, "have")),
    };
    let ty = self.to_pexpr(ty)?;
    let proof = self.to_pexpr(proof)?;
    self.push_local(name.clone());
    let body = self.to_pexpr(body);
    self.locals.pop();
    Ok(Expr::app(Expr::lam(BinderInfo::Default, name, ty, body?), proof))
  }

  /// `show ty, from e` and `(e : ty)` both elaborate to an identity
  /// function at `ty` applied to `e`, which forces the ascription.
  fn ascribe(&mut self, ty: &Syntax, e: &Syntax) -> Result<Expr> {
    let ty = self.to_pexpr(ty)?;
    let e = self.to_pexpr(e)?;
    let id = Expr::lam(BinderInfo::Default, Name::simple("this"), ty, Expr::bvar(0));
    Ok(Expr::app(id, e))
  }

  fn sort_expr(&mut self, stx: &Syntax, n: &SyntaxNode) -> Result<Expr> {
    let (kw, level) = match &*n.args {
      [kw] => (kw, None),
      [kw, level] => (kw, Some(level)),
      _ => return Err(self.ill(stx, "sort")),
    };
    let Some(kw) = kw.as_atom() else { return Err(self.ill(stx, "sort")) };
    match (&*kw.val, level) {
      (b"Prop", None) => Ok(Expr::sort(Level::zero())),
      (b"Type", None) => Ok(Expr::sort(Level::zero().succ())),
      (b"Type", Some(l)) => Ok(Expr::sort(self.to_level(l)?.succ())),
      (b"Sort", None) => Ok(Expr::sort(self.fresh_level())),
      (b"Sort", Some(l)) => Ok(Expr::sort(self.to_level(l)?)),
      _ => Err(self.ill(stx, "sort")),
    }
  }

  fn struct_inst(&mut self, stx: &Syntax, n: &SyntaxNode) -> Result<Expr> {
    let mut struct_name = None;
    let mut fields = vec![];
    let mut sources = vec![];
    for arg in &n.args {
      if let Some(i) = arg.as_ident() {
        if struct_name.replace(i.name.clone()).is_some() {
          return Err(self.ill(stx, "structure instance"))
        }
      } else if let Some(item) = arg.as_kind(BuiltinKind::StructInstItem) {
        if_chain! {
          if let [fld, value] = &*item.args;
          if let Some(fld) = fld.as_ident();
          then {
            let value = self.to_pexpr(value)?;
            let kv = KvMap::new().set_name(keys::FIELD.clone(), fld.name.clone());
            fields.push(Expr::mdata(kv, value));
          }
          else { return Err(self.ill(arg, "structure instance field")) }
        }
      } else if let Some(src) = arg.as_kind(BuiltinKind::StructInstSource) {
        let [e] = &*src.args else { return Err(self.ill(arg, "structure instance source")) };
        sources.push(self.to_pexpr(e)?);
      } else {
        return Err(self.ill(stx, "structure instance"))
      }
    }
    let mut kv = KvMap::new()
      .set_bool(keys::STRUCT_INST.clone(), true)
      .set_nat(keys::FIELDS.clone(), fields.len())
      .set_nat(keys::SOURCES.clone(), sources.len());
    if let Some(s) = struct_name {
      kv = kv.set_name(keys::STRUCT.clone(), s)
    }
    let head = self.fresh_mvar();
    Ok(Expr::mdata(kv, Expr::apps(head, fields.into_iter().chain(sources))))
  }

  fn match_expr(&mut self, stx: &Syntax, n: &SyntaxNode) -> Result<Expr> {
    let Some((scrut, arms)) = n.args.split_first() else {
      return Err(self.ill(stx, "match"))
    };
    let scrut = self.to_pexpr(scrut)?;
    let mut parts = vec![scrut];
    for arm in arms {
      let Some(a) = arm.as_kind(BuiltinKind::MatchArm) else {
        return Err(self.ill(arm, "match arm"))
      };
      let Some((rhs, pats)) = a.args.split_last() else {
        return Err(self.ill(arm, "match arm"))
      };
      if pats.is_empty() {
        return Err(self.ill(arm, "match arm"))
      }
      let mut arm_parts =
        pats.iter().map(|p| self.to_pexpr(p)).collect::<Result<Vec<_>>>()?;
      arm_parts.push(self.to_pexpr(rhs)?);
      let kv = KvMap::new().set_nat(keys::MATCH_ARM.clone(), pats.len());
      parts.push(Expr::mdata(kv, Expr::apps(self.fresh_mvar(), arm_parts)));
    }
    let kv = KvMap::new().set_bool(keys::MATCH.clone(), true);
    Ok(Expr::mdata(kv, Expr::apps(self.fresh_mvar(), parts)))
  }

  fn proj_expr(&mut self, stx: &Syntax, n: &SyntaxNode) -> Result<Expr> {
    if_chain! {
      if let [e, fld] = &*n.args;
      if let Some(fld) = fld.as_atom();
      then {
        let e = self.to_pexpr(e)?;
        let kv = if fld.val.iter().all(u8::is_ascii_digit) && !fld.val.is_empty() {
          let Some(idx) = BigUint::parse_bytes(&fld.val, 10) else {
            return Err(self.ill(stx, "projection"))
          };
          KvMap::new().set_nat(keys::FIELD.clone(), idx)
        } else {
          KvMap::new().set_name(keys::FIELD.clone(), Name::simple(fld.val.clone()))
        };
        Ok(Expr::mdata(kv, e))
      }
      else { Err(self.ill(stx, "projection")) }
    }
  }

  fn numeral(&self, stx: &Syntax, n: &SyntaxNode) -> Result<BigUint> {
    if_chain! {
      if n.kind == SyntaxKind::Builtin(BuiltinKind::Number);
      if let [arg] = &*n.args;
      if let Some(a) = arg.as_atom();
      if let Some(v) = BigUint::parse_bytes(&a.val, 10);
      then { Ok(v) }
      else { Err(self.ill(stx, "numeral")) }
    }
  }

  /// Elaborates universe level syntax.
  pub fn to_level(&mut self, stx: &Syntax) -> Result<Level> {
    match stx {
      Syntax::Missing => Ok(self.fresh_level()),
      Syntax::Ident(i) => {
        if self.scopes.univ_in_scope(&i.name) {
          Ok(Level::param(i.name.clone()))
        } else {
          Err(self.err(stx, format!("unknown universe '{}'", i.name)))
        }
      }
      Syntax::Atom(_) => Err(self.ill(stx, "universe level")),
      Syntax::Node(n) => match n.kind {
        SyntaxKind::Builtin(BuiltinKind::Number) => {
          let v = self.numeral(stx, n)?;
          let v = u32::try_from(&v)
            .map_err(|_| self.err(stx, "universe level too large"))?;
          Ok(Level::of_nat(v))
        }
        SyntaxKind::Builtin(BuiltinKind::Hole) => Ok(self.fresh_level()),
        SyntaxKind::Builtin(BuiltinKind::Paren) => {
          let [inner] = &*n.args else { return Err(self.ill(stx, "universe level")) };
          self.to_level(inner)
        }
        SyntaxKind::Builtin(BuiltinKind::LevelAdd) => {
          let [l, k] = &*n.args else { return Err(self.ill(stx, "universe level")) };
          let l = self.to_level(l)?;
          let Some(kn) = k.as_kind(BuiltinKind::Number) else {
            return Err(self.ill(stx, "universe level"))
          };
          let k = u32::try_from(&self.numeral(k, kn)?)
            .map_err(|_| self.err(stx, "universe level too large"))?;
          Ok((0..k).fold(l, |l, _| l.succ()))
        }
        SyntaxKind::Builtin(kind @ (BuiltinKind::LevelMax | BuiltinKind::LevelImax)) => {
          if n.args.len() < 2 {
            return Err(self.ill(stx, "universe level"))
          }
          let mut levels = n
            .args
            .iter()
            .map(|l| self.to_level(l))
            .collect::<Result<Vec<_>>>()?;
          let mut acc = levels.pop().expect("at least two levels");
          for l in levels.into_iter().rev() {
            acc = if kind == BuiltinKind::LevelMax {
              Level::max(l, acc)
            } else {
              Level::imax(l, acc)
            };
          }
          Ok(acc)
        }
        _ => Err(self.ill(stx, "universe level")),
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ExprKind, KvValue};

  /// Recursively drops metadata, for shape assertions.
  fn strip(e: &Expr) -> Expr {
    match e.kind() {
      ExprKind::Mdata(_, inner) => strip(inner),
      ExprKind::App(f, a) => Expr::app(strip(f), strip(a)),
      ExprKind::Lambda(bi, n, d, b) => Expr::lam(*bi, n.clone(), strip(d), strip(b)),
      ExprKind::Pi(bi, n, d, b) => Expr::pi(*bi, n.clone(), strip(d), strip(b)),
      ExprKind::Let(n, t, v, b) => Expr::let_(n.clone(), strip(t), strip(v), strip(b)),
      ExprKind::Choice(es) => Expr::choice(es.iter().map(strip).collect()),
      ExprKind::Sort(l) => Expr::sort(l.clone()),
      _ => e.clone(),
    }
  }

  fn pexpr_in(scopes: &ScopeState, stx: &Syntax) -> Result<Expr> {
    let file = LinedString::from("");
    let notations = NotationTable::new();
    let mut ngen = NameGen::default();
    ExprBuilder::new(&file, scopes, &notations, &mut ngen, (0..0).into()).to_pexpr(stx)
  }

  fn pexpr(stx: &Syntax) -> Result<Expr> { pexpr_in(&ScopeState::new(), stx) }

  fn explicit_group(names: &[&str], ty: Option<Syntax>) -> Syntax {
    let mut args: Vec<Syntax> = names.iter().map(|&n| Syntax::ident(n)).collect();
    if let Some(ty) = ty {
      args.push(Syntax::node(BuiltinKind::TypeAscription, vec![ty]));
    }
    Syntax::node(BuiltinKind::BinderExplicit, args)
  }

  #[test]
  fn lambda_body_sees_binder() {
    let stx = Syntax::node(BuiltinKind::Lambda, vec![
      explicit_group(&["x"], Some(Syntax::ident("A"))),
      Syntax::ident("x"),
    ]);
    let e = strip(&pexpr(&stx).unwrap());
    let ExprKind::Lambda(BinderInfo::Default, name, _, body) = e.kind() else {
      panic!("expected a lambda, got {e:?}")
    };
    assert_eq!(name, &Name::from("x"));
    assert_eq!(body, &Expr::local("x".into()));
  }

  #[test]
  fn binder_group_shares_its_type() {
    let stx = Syntax::node(BuiltinKind::Pi, vec![
      explicit_group(&["x", "y"], Some(Syntax::ident("A"))),
      Syntax::ident("y"),
    ]);
    let e = strip(&pexpr(&stx).unwrap());
    let ExprKind::Pi(_, x, dom_x, inner) = e.kind() else { panic!("expected pi") };
    let ExprKind::Pi(_, y, dom_y, body) = inner.kind() else { panic!("expected nested pi") };
    assert_eq!((x, y), (&Name::from("x"), &Name::from("y")));
    assert_eq!(dom_x, dom_y);
    assert_eq!(body, &Expr::local("y".into()));
  }

  #[test]
  fn unresolved_ident_is_marked() {
    let e = pexpr(&Syntax::ident("zzz")).unwrap();
    assert_eq!(e.annotation(&keys::PRERESOLVED), Some(&KvValue::Bool(false)));
    assert_eq!(strip(&e), Expr::const_("zzz".into(), vec![]));
    // the _root_ escape is stripped in the embedded name
    let e = pexpr(&Syntax::ident("_root_.foo")).unwrap();
    assert_eq!(strip(&e), Expr::const_("foo".into(), vec![]));
  }

  #[test]
  fn ambiguous_ident_becomes_choice() {
    let mut ident = Syntax::ident("x");
    if let Syntax::Ident(i) = &mut ident {
      i.preresolved = vec!["A.x".into(), "B.x".into()];
    }
    let e = pexpr(&ident).unwrap();
    assert_eq!(e.annotation(&keys::CHOICE), Some(&KvValue::Nat(2u32.into())));
    let stripped = strip(&e);
    let ExprKind::Choice(alts) = stripped.kind() else { panic!("expected choice") };
    assert_eq!(
      &**alts,
      [Expr::const_("A.x".into(), vec![]), Expr::const_("B.x".into(), vec![])]
    );
  }

  #[test]
  fn arrow_is_a_nondependent_pi() {
    let stx = Syntax::node(BuiltinKind::Arrow, vec![Syntax::ident("a"), Syntax::ident("b")]);
    let e = strip(&pexpr(&stx).unwrap());
    let ExprKind::Pi(BinderInfo::Default, name, _, _) = e.kind() else { panic!("expected pi") };
    assert!(name.is_anon());
  }

  #[test]
  fn sort_forms() {
    let sort = |args| Syntax::node(BuiltinKind::Sort, args);
    let e = pexpr(&sort(vec![Syntax::atom("Prop")])).unwrap();
    assert_eq!(strip(&e), Expr::sort(Level::zero()));
    let e = pexpr(&sort(vec![Syntax::atom("Type")])).unwrap();
    assert_eq!(strip(&e), Expr::sort(Level::zero().succ()));

    let mut scopes = ScopeState::new();
    scopes.add_univ("u".into(), None);
    let u = sort(vec![Syntax::atom("Sort"), Syntax::ident("u")]);
    let e = pexpr_in(&scopes, &u).unwrap();
    assert_eq!(strip(&e), Expr::sort(Level::param("u".into())));
    let v = sort(vec![Syntax::atom("Sort"), Syntax::ident("v")]);
    let err = pexpr_in(&scopes, &v).unwrap_err();
    assert!(err.message.to_string().contains("unknown universe"));
  }

  #[test]
  fn let_without_type_gets_a_hole() {
    let stx = Syntax::node(BuiltinKind::Let, vec![
      Syntax::ident("x"),
      Syntax::node(BuiltinKind::Number, vec![Syntax::atom("1")]),
      Syntax::ident("x"),
    ]);
    let e = strip(&pexpr(&stx).unwrap());
    let ExprKind::Let(name, ty, value, body) = e.kind() else { panic!("expected let") };
    assert_eq!(name, &Name::from("x"));
    assert!(matches!(ty.kind(), ExprKind::Mvar(_)));
    assert_eq!(value, &Expr::nat(1u32));
    assert_eq!(body, &Expr::local("x".into()));
  }

  #[test]
  fn show_is_an_ascription() {
    let stx = Syntax::node(BuiltinKind::Show, vec![Syntax::ident("t"), Syntax::ident("e")]);
    let e = strip(&pexpr(&stx).unwrap());
    let ExprKind::App(f, a) = e.kind() else { panic!("expected app") };
    let ExprKind::Lambda(_, _, ty, body) = f.kind() else { panic!("expected lambda") };
    assert_eq!(ty, &Expr::const_("t".into(), vec![]));
    assert_eq!(body, &Expr::bvar(0));
    assert_eq!(a, &Expr::const_("e".into(), vec![]));
  }

  #[test]
  fn positions_attach_as_row_and_column() {
    let file = LinedString::from("ab\ncd");
    let scopes = ScopeState::new();
    let notations = NotationTable::new();
    let mut ngen = NameGen::default();
    let mut bld = ExprBuilder::new(&file, &scopes, &notations, &mut ngen, (0..0).into());
    let e = bld.to_pexpr(&Syntax::ident("q").with_span(3..4)).unwrap();
    assert_eq!(e.annotation(&keys::ROW), Some(&KvValue::Nat(2u32.into())));
    assert_eq!(e.annotation(&keys::COLUMN), Some(&KvValue::Nat(0u32.into())));
  }

  #[test]
  fn match_is_captured_opaquely() {
    let arm = Syntax::node(BuiltinKind::MatchArm, vec![
      Syntax::ident("zero"),
      Syntax::node(BuiltinKind::Number, vec![Syntax::atom("0")]),
    ]);
    let stx = Syntax::node(BuiltinKind::Match, vec![Syntax::ident("n"), arm]);
    let e = pexpr(&stx).unwrap();
    assert_eq!(e.annotation(&keys::MATCH), Some(&KvValue::Bool(true)));
  }

  #[test]
  fn struct_inst_encoding() {
    let stx = Syntax::node(BuiltinKind::StructInst, vec![
      Syntax::ident("point"),
      Syntax::node(BuiltinKind::StructInstItem, vec![
        Syntax::ident("x"),
        Syntax::node(BuiltinKind::Number, vec![Syntax::atom("1")]),
      ]),
      Syntax::node(BuiltinKind::StructInstSource, vec![Syntax::ident("p")]),
    ]);
    let e = pexpr(&stx).unwrap();
    assert_eq!(e.annotation(&keys::STRUCT_INST), Some(&KvValue::Bool(true)));
    assert_eq!(e.annotation(&keys::FIELDS), Some(&KvValue::Nat(1u32.into())));
    assert_eq!(e.annotation(&keys::SOURCES), Some(&KvValue::Nat(1u32.into())));
    assert_eq!(e.annotation(&keys::STRUCT), Some(&KvValue::Name("point".into())));
  }

  #[test]
  fn notation_expansion_recurses() {
    let mut notations = NotationTable::new();
    notations.register(
      crate::NotationId(7).name(),
      crate::elab::notation::NotationExpander::new(
        vec!["x".into()],
        Syntax::node(BuiltinKind::App, vec![Syntax::ident("wrap"), Syntax::ident("x")]),
      ),
    );
    let file = LinedString::from("");
    let scopes = ScopeState::new();
    let mut ngen = NameGen::default();
    let mut bld = ExprBuilder::new(&file, &scopes, &notations, &mut ngen, (0..0).into());
    let stx = Syntax::node(crate::NotationId(7), vec![Syntax::ident("y")]);
    let e = strip(&bld.to_pexpr(&stx).unwrap());
    assert_eq!(
      e,
      Expr::app(Expr::const_("wrap".into(), vec![]), Expr::const_("y".into(), vec![]))
    );
    // wrong arity is rejected
    let bad = Syntax::node(crate::NotationId(7), vec![]);
    assert!(bld.to_pexpr(&bad).is_err());
    // unknown notation kinds are rejected
    let unknown = Syntax::node(crate::NotationId(8), vec![]);
    let err = bld.to_pexpr(&unknown).unwrap_err();
    assert!(err.message.to_string().contains("has not been defined"));
  }

  #[test]
  fn levels() {
    let num = |s: &str| Syntax::node(BuiltinKind::Number, vec![Syntax::atom(s)]);
    let mut scopes = ScopeState::new();
    scopes.add_univ("u".into(), None);
    let file = LinedString::from("");
    let notations = NotationTable::new();
    let mut ngen = NameGen::default();
    let mut bld = ExprBuilder::new(&file, &scopes, &notations, &mut ngen, (0..0).into());

    assert_eq!(bld.to_level(&num("2")).unwrap(), Level::of_nat(2));
    let add = Syntax::node(BuiltinKind::LevelAdd, vec![Syntax::ident("u"), num("1")]);
    assert_eq!(bld.to_level(&add).unwrap(), Level::param("u".into()).succ());
    let max = Syntax::node(BuiltinKind::LevelMax, vec![Syntax::ident("u"), num("1"), num("0")]);
    assert_eq!(
      bld.to_level(&max).unwrap(),
      Level::max(Level::param("u".into()), Level::max(Level::of_nat(1), Level::zero()))
    );
  }
}
