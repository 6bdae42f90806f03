//! The command-stream driver and the elaborator state it threads.
//!
//! [`Elaborator::run`] pulls commands one at a time from a [`CommandSource`],
//! passing the current [`ParserConfig`] with each pull so the source can
//! parse against the tokens and rules declared by earlier commands, and
//! dispatches each command to its handler in [`command`]. Errors inside a
//! command are pushed to the [`MessageLog`] and elaboration continues with
//! the next command; only a handful of conditions end the run early (fuel
//! exhaustion, scope nesting past the recursion bound, a malformed scope
//! structure, a command kind with no handler). Either way the caller gets
//! back the [`Environment`] built so far together with the full log.
//!
//! `namespace` and `section` are handled here rather than in [`command`]
//! because they recurse into the command loop: the driver pushes a scope
//! frame carrying a snapshot of the parser configuration, elaborates until
//! the matching `end`, then pops the frame and restores the snapshot so
//! notation declared inside the scope stops parsing outside it.

pub mod command;
pub mod notation;
pub mod pexpr;
pub mod resolve;

use crate::elab::notation::NotationTable;
use crate::elab::resolve::{ScopeFrame, ScopeState};
use crate::env::{Environment, Options};
use crate::grammar::ParserConfig;
use crate::message::{ErrorLevel, Message, MessageLog};
use crate::syntax::{BuiltinKind, SyntaxKind, SyntaxNode};
use crate::{BoxError, FileRef, LinedString, Name, NameGen, Span, Syntax};

/// An error during the elaboration of a command.
///
/// Returning `Err` from a handler abandons the rest of that command only:
/// the driver [reports](Elaborator::report) the error and pulls the next
/// command. Conditions that should not abort the command are reported
/// directly instead of being returned.
#[derive(Debug)]
pub struct ElabError {
  /// The location of the error.
  pub pos: Span,
  /// The severity of the error.
  pub level: ErrorLevel,
  /// The error message.
  pub message: BoxError,
  /// Related positions, attached as notes.
  pub notes: Vec<(Span, String)>,
}

/// The main result type used by functions in this module.
pub type Result<T, E = ElabError> = std::result::Result<T, E>;

impl ElabError {
  /// An error-severity message at a location.
  pub fn new_e(pos: impl Into<Span>, e: impl Into<BoxError>) -> ElabError {
    ElabError { pos: pos.into(), level: ErrorLevel::Error, message: e.into(), notes: vec![] }
  }

  /// A warning at a location.
  pub fn warn(pos: impl Into<Span>, e: impl Into<BoxError>) -> ElabError {
    ElabError { pos: pos.into(), level: ErrorLevel::Warning, message: e.into(), notes: vec![] }
  }

  /// An informational message at a location.
  pub fn info(pos: impl Into<Span>, e: impl Into<BoxError>) -> ElabError {
    ElabError { pos: pos.into(), level: ErrorLevel::Info, message: e.into(), notes: vec![] }
  }

  /// Attaches a note pointing at a related position.
  #[must_use]
  pub fn with_note(mut self, pos: impl Into<Span>, text: impl Into<String>) -> ElabError {
    self.notes.push((pos.into(), text.into()));
    self
  }
}

/// Where the driver pulls commands from.
///
/// The parser configuration changes as `notation` and `reserve_notation`
/// commands elaborate, so each pull passes the current one by reference;
/// a parser driving this interface can consult it to recognize notation
/// declared earlier in the same stream. Sources signal exhaustion with an
/// [`Eoi`](BuiltinKind::Eoi) node and the driver stops pulling once it
/// sees one.
pub trait CommandSource {
  /// Produces the next top-level command.
  fn next_command(&mut self, cfg: &ParserConfig) -> Syntax;
}

impl<F: FnMut(&ParserConfig) -> Syntax> CommandSource for F {
  fn next_command(&mut self, cfg: &ParserConfig) -> Syntax { self(cfg) }
}

/// A [`CommandSource`] yielding a fixed list of already parsed commands,
/// ignoring the parser configuration.
#[derive(Debug)]
pub struct SyntaxStream(std::vec::IntoIter<Syntax>);

impl SyntaxStream {
  /// A stream yielding `commands` in order, then `Eoi` forever.
  #[must_use]
  pub fn new(commands: Vec<Syntax>) -> SyntaxStream { SyntaxStream(commands.into_iter()) }
}

impl From<Vec<Syntax>> for SyntaxStream {
  fn from(commands: Vec<Syntax>) -> SyntaxStream { SyntaxStream::new(commands) }
}

impl CommandSource for SyntaxStream {
  fn next_command(&mut self, _: &ParserConfig) -> Syntax {
    self.0.next().unwrap_or_else(|| Syntax::node(BuiltinKind::Eoi, vec![]))
  }
}

/// Why one level of the command loop returned.
#[derive(Debug)]
enum ScopeExit {
  /// The source is exhausted.
  Eoi,
  /// An `end` command, to be matched against the scope being closed.
  End(Syntax),
  /// A run-fatal error was reported; unwind without pulling again.
  Fatal,
}

/// A validated `namespace`/`section` header.
#[derive(Debug)]
enum ScopeHeader {
  /// `namespace N`.
  Namespace(Name),
  /// `section` with an optional label.
  Section(Option<Name>),
}

/// The elaborator state for a single run over a command stream.
#[derive(Debug)]
pub struct Elaborator {
  path: FileRef,
  pub(crate) file: LinedString,
  /// The environment being extended.
  pub env: Environment,
  /// The current option values, consulted for the fuel and recursion bounds.
  pub options: Options,
  pub(crate) log: MessageLog,
  pub(crate) scopes: ScopeState,
  pub(crate) cfg: ParserConfig,
  pub(crate) notations: NotationTable,
  pub(crate) ngen: NameGen,
  /// The 1-based index of the command being elaborated. Notation kinds are
  /// minted from it, so a kind identifies its declaring command. Wide
  /// enough that it cannot wrap within any `max_commands` bound.
  pub(crate) command_idx: u64,
  /// The span of the command being elaborated, used as the position of
  /// diagnostics on syntax that carries no span of its own.
  pub(crate) command_span: Span,
}

impl Elaborator {
  /// A fresh elaborator over an empty environment, with only the root
  /// scope open and no tokens or notations registered.
  #[must_use]
  pub fn new(path: FileRef, file: LinedString, options: Options) -> Elaborator {
    Elaborator {
      path,
      file,
      env: Environment::new(),
      options,
      log: MessageLog::default(),
      scopes: ScopeState::new(),
      cfg: ParserConfig::new(),
      notations: NotationTable::new(),
      ngen: NameGen::default(),
      command_idx: 0,
      command_span: Span::default(),
    }
  }

  /// The file being elaborated.
  #[must_use]
  pub fn path(&self) -> &FileRef { &self.path }

  /// Pushes a diagnostic onto the log.
  pub(crate) fn report(&mut self, e: ElabError) {
    let mut m = Message::new(e.pos, e.level, e.message.to_string());
    m.notes = e.notes;
    self.log.push(m)
  }

  pub(crate) fn catch(&mut self, r: Result<()>) { r.unwrap_or_else(|e| self.report(e)) }

  fn stx_pos(&self, stx: &Syntax) -> Span { stx.get_pos().unwrap_or(self.command_span) }

  fn node_pos(&self, n: &SyntaxNode) -> Span { n.span.unwrap_or(self.command_span) }

  fn ill(&self, stx: &Syntax, what: &str) -> ElabError {
    ElabError::new_e(self.stx_pos(stx), format!("ill-formed {what}"))
  }

  fn ill_node(&self, n: &SyntaxNode, what: &str) -> ElabError {
    ElabError::new_e(self.node_pos(n), format!("ill-formed {what}"))
  }

  /// Elaborates commands until the source is exhausted or a fatal error
  /// stops the run, returning the environment built so far and the log.
  pub fn run(mut self, source: &mut impl CommandSource) -> (Environment, MessageLog) {
    log::debug!("elaborating {}", self.path);
    self.elab_commands(source, 0);
    (self.env, self.log)
  }

  /// One level of the command loop. `depth` is the number of enclosing
  /// `namespace`/`section` scopes; at depth 0 `Eoi` is a normal finish and
  /// `end` is an error, at positive depths the reverse.
  fn elab_commands(&mut self, source: &mut impl CommandSource, depth: u64) -> ScopeExit {
    loop {
      let stx = source.next_command(&self.cfg);
      self.command_idx += 1;
      self.command_span = stx.get_pos().unwrap_or_default();
      if self.command_idx > self.options.max_commands() {
        self.report(ElabError::new_e(self.command_span, "out of fuel"));
        return ScopeExit::Fatal
      }
      match stx.kind() {
        Some(SyntaxKind::Builtin(BuiltinKind::Eoi)) => {
          if depth > 0 {
            self.report(ElabError::new_e(self.command_span, "expected 'end'"));
            return ScopeExit::Fatal
          }
          return ScopeExit::Eoi
        }
        Some(SyntaxKind::Builtin(BuiltinKind::End)) => {
          if depth == 0 {
            self.report(ElabError::new_e(
              self.command_span,
              "invalid 'end', there is no open scope to end",
            ));
            return ScopeExit::Fatal
          }
          return ScopeExit::End(stx)
        }
        Some(SyntaxKind::Builtin(k @ (BuiltinKind::Namespace | BuiltinKind::Section))) => {
          match self.scope_header(&stx, k == BuiltinKind::Namespace) {
            Err(e) => self.report(e),
            Ok(header) =>
              if self.elab_scope(source, depth + 1, header) {
                return ScopeExit::Fatal
              },
          }
        }
        Some(SyntaxKind::Builtin(k)) if k.is_command() => {
          let r = self.elab_command(k, &stx);
          self.catch(r)
        }
        Some(kind) => {
          let name = match kind {
            SyntaxKind::Builtin(k) => k.name().to_owned(),
            SyntaxKind::Notation(id) => id.name().to_string(),
          };
          self.report(ElabError::new_e(self.command_span, format!("unknown command: {name}")));
          return ScopeExit::Fatal
        }
        // A bare atom or identifier at the top level elaborates as `#check`.
        None => {
          let r = self.check_term(&stx);
          self.catch(r)
        }
      }
    }
  }

  fn elab_command(&mut self, k: BuiltinKind, stx: &Syntax) -> Result<()> {
    let Some(n) = stx.as_node() else { return Err(self.ill(stx, "command")) };
    log::debug!("command {}: {}", self.command_idx, k.name());
    match k {
      BuiltinKind::Universe => self.elab_universe(n),
      BuiltinKind::Variables => self.elab_variables(n),
      BuiltinKind::Include => self.elab_include(n),
      BuiltinKind::Declaration => self.elab_declaration(n),
      BuiltinKind::Notation => self.elab_notation(n, false),
      BuiltinKind::ReserveNotation => self.elab_notation(n, true),
      BuiltinKind::Attribute => self.elab_attribute(n),
      BuiltinKind::Open => self.elab_open(n),
      BuiltinKind::Export => self.elab_export(n),
      BuiltinKind::Check => self.elab_check(n),
      BuiltinKind::SetOption => self.elab_set_option(n),
      BuiltinKind::InitQuot => self.elab_init_quot(n),
      _ => Err(self.ill(stx, "command")),
    }
  }

  /// Validates the header of a `namespace` or `section` command. A
  /// namespace requires a name; a section takes an optional label.
  fn scope_header(&self, stx: &Syntax, namespace: bool) -> Result<ScopeHeader> {
    let args: &[Syntax] = stx.as_node().map_or(&[], |n| &n.args);
    let what = if namespace { "namespace" } else { "section" };
    match args {
      [] if namespace => Err(self.ill(stx, what)),
      [] => Ok(ScopeHeader::Section(None)),
      [id] => {
        let name = id.as_ident().ok_or_else(|| self.ill(id, what))?.name.clone();
        Ok(if namespace { ScopeHeader::Namespace(name) } else { ScopeHeader::Section(Some(name)) })
      }
      _ => Err(self.ill(stx, what)),
    }
  }

  /// Elaborates a scope body up to its matching `end`, then pops the frame
  /// and restores the parser configuration snapshotted at entry. Returns
  /// whether a fatal error should unwind the enclosing loops.
  fn elab_scope(&mut self, source: &mut impl CommandSource, depth: u64, header: ScopeHeader) -> bool {
    if depth > self.options.max_recursion() {
      self.report(ElabError::new_e(self.command_span, "maximum recursion depth exceeded"));
      return true
    }
    let snapshot = self.cfg.clone();
    match header {
      ScopeHeader::Namespace(name) => self.scopes.push_namespace(name, snapshot),
      ScopeHeader::Section(label) => self.scopes.push_section(label, snapshot),
    }
    match self.elab_commands(source, depth) {
      ScopeExit::Eoi | ScopeExit::Fatal => true,
      ScopeExit::End(end) => {
        let frame = self.scopes.pop();
        self.cfg = frame.config.clone();
        self.match_end_label(&frame, &end);
        false
      }
    }
  }

  /// Checks an `end` command's label against the frame it closes. A
  /// mismatch is reported, but the scope has already been popped so a
  /// stray label does not leave the scope dangling.
  fn match_end_label(&mut self, frame: &ScopeFrame, end: &Syntax) {
    let pos = self.stx_pos(end);
    let args: &[Syntax] = end.as_node().map_or(&[], |n| &n.args);
    let label = match args {
      [] => None,
      [id] => match id.as_ident() {
        Some(i) => Some(i.name.clone()),
        None => {
          self.report(self.ill(id, "end"));
          return
        }
      },
      _ => {
        self.report(ElabError::new_e(pos, "ill-formed end"));
        return
      }
    };
    match (&frame.label, label) {
      (Some(expected), Some(actual)) if *expected == actual => {}
      (None, None) => {}
      (Some(expected), _) => self.report(ElabError::new_e(
        pos,
        format!("invalid end of {}, expected name '{expected}'", frame.kind.descr()),
      )),
      (None, Some(_)) =>
        self.report(ElabError::new_e(pos, "invalid end of section, expected no name")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::env::{CoreCommand, OptionValue};
  use crate::syntax::NotationId;

  fn new_elab() -> Elaborator {
    Elaborator::new("test.lean".into(), LinedString::from(""), Options::default())
  }

  fn ident(name: &str) -> Syntax { Syntax::ident(name) }

  fn decl(kw: &str, name: &str) -> Syntax {
    Syntax::node(
      BuiltinKind::Declaration,
      vec![
        Syntax::node(BuiltinKind::DeclModifiers, vec![]),
        Syntax::atom(kw),
        Syntax::ident(name),
        Syntax::node(BuiltinKind::DeclSig, vec![]),
        Syntax::node(BuiltinKind::Hole, vec![]),
      ],
    )
  }

  fn namespace(name: &str) -> Syntax {
    Syntax::node(BuiltinKind::Namespace, vec![Syntax::ident(name)])
  }

  fn end(label: Option<&str>) -> Syntax {
    Syntax::node(BuiltinKind::End, label.map(Syntax::ident).into_iter().collect())
  }

  fn run(commands: Vec<Syntax>) -> (Environment, MessageLog) {
    new_elab().run(&mut SyntaxStream::new(commands))
  }

  fn errors(log: &MessageLog) -> Vec<String> {
    log.iter().map(|m| m.text.clone()).collect()
  }

  #[test]
  fn namespaces_nest_and_qualify() {
    let (env, log) = run(vec![
      namespace("a"),
      namespace("b"),
      decl("def", "c"),
      end(Some("b")),
      end(Some("a")),
      decl("def", "d"),
    ]);
    assert!(log.is_empty(), "{:?}", errors(&log));
    assert!(env.contains(&Name::from("a.b.c")));
    assert!(env.contains(&Name::from("d")));
  }

  #[test]
  fn end_label_mismatch_is_reported_but_the_scope_closes() {
    let (env, log) = run(vec![
      namespace("foo"),
      end(Some("bar")),
      decl("def", "x"),
    ]);
    assert_eq!(errors(&log), ["invalid end of namespace, expected name 'foo'"]);
    // the scope did close, so `x` lands at the root
    assert!(env.contains(&Name::from("x")));
  }

  #[test]
  fn end_without_an_open_scope_is_fatal() {
    let (env, log) = run(vec![end(None), decl("def", "x")]);
    assert_eq!(errors(&log), ["invalid 'end', there is no open scope to end"]);
    assert!(!env.contains(&Name::from("x")));
  }

  #[test]
  fn a_missing_end_is_reported_at_eoi() {
    let (_, log) = run(vec![namespace("foo"), decl("def", "x")]);
    assert_eq!(errors(&log), ["expected 'end'"]);
  }

  #[test]
  fn anonymous_section_rejects_a_labeled_end() {
    let (_, log) = run(vec![
      Syntax::node(BuiltinKind::Section, vec![]),
      end(Some("foo")),
    ]);
    assert_eq!(errors(&log), ["invalid end of section, expected no name"]);
  }

  #[test]
  fn a_namespace_needs_a_name() {
    let (env, log) = run(vec![
      Syntax::node(BuiltinKind::Namespace, vec![]),
      decl("def", "x"),
    ]);
    assert_eq!(errors(&log), ["ill-formed namespace"]);
    // the malformed header is skipped without opening a scope
    assert!(env.contains(&Name::from("x")));
  }

  #[test]
  fn fuel_runs_out() {
    let mut el = new_elab();
    el.options.set(Options::max_commands_name(), OptionValue::Nat(2));
    let (env, log) =
      el.run(&mut SyntaxStream::new(vec![decl("def", "a"), decl("def", "b"), decl("def", "c")]));
    assert_eq!(errors(&log), ["out of fuel"]);
    assert!(env.contains(&Name::from("a")));
    assert!(env.contains(&Name::from("b")));
    assert!(!env.contains(&Name::from("c")));
  }

  #[test]
  fn minted_ids_stay_fresh_past_u32_commands() {
    let mut el = new_elab();
    el.options.set(Options::max_commands_name(), OptionValue::Nat(u64::MAX));
    el.command_idx = u64::from(u32::MAX);
    let mut source = SyntaxStream::new(vec![
      decl("def", "a"),
      Syntax::node(
        BuiltinKind::Notation,
        vec![
          Syntax::node(BuiltinKind::NotaLiteral, vec![Syntax::atom("~")]),
          Syntax::node(BuiltinKind::NotaSlot, vec![Syntax::ident("a")]),
          Syntax::ident("a"),
        ],
      ),
    ]);
    assert!(matches!(el.elab_commands(&mut source, 0), ScopeExit::Eoi));
    assert!(el.log.is_empty(), "{:?}", errors(&el.log));
    // the notation was command u32::MAX + 2, and its id does not collide
    // with the ids an early command would have minted
    assert!(el.cfg.rule(&NotationId(u64::from(u32::MAX) + 2).name()).is_some());
    assert!(el.cfg.rule(&NotationId(1).name()).is_none());
    assert!(el.cfg.rule(&NotationId(2).name()).is_none());
  }

  #[test]
  fn scope_nesting_is_bounded() {
    let mut el = new_elab();
    el.options.set(Options::max_recursion_name(), OptionValue::Nat(1));
    let (_, log) = el.run(&mut SyntaxStream::new(vec![namespace("a"), namespace("b")]));
    assert_eq!(errors(&log), ["maximum recursion depth exceeded"]);
  }

  #[test]
  fn an_unhandled_kind_is_fatal() {
    let (env, log) = run(vec![
      Syntax::node(BuiltinKind::Arrow, vec![ident("a"), ident("b")]),
      decl("def", "x"),
    ]);
    assert_eq!(errors(&log), ["unknown command: term.arrow"]);
    assert!(!env.contains(&Name::from("x")));
  }

  #[test]
  fn a_bare_identifier_elaborates_as_check() {
    let (env, log) = run(vec![ident("x")]);
    assert!(log.is_empty(), "{:?}", errors(&log));
    assert!(matches!(env.commands(), [CoreCommand::Check(_)]));
  }

  #[test]
  fn scopes_restore_the_parser_config() {
    let mut el = new_elab();
    let rule_name = NotationId(2).name();
    let mut source = SyntaxStream::new(vec![
      Syntax::node(BuiltinKind::Section, vec![]),
      Syntax::node(
        BuiltinKind::Notation,
        vec![
          Syntax::node(BuiltinKind::NotaLiteral, vec![Syntax::atom("~")]),
          Syntax::node(BuiltinKind::NotaSlot, vec![Syntax::ident("a")]),
          Syntax::ident("a"),
        ],
      ),
    ]);
    assert!(matches!(el.elab_commands(&mut source, 0), ScopeExit::Fatal));
    // `end` was missing, so the section never popped and nothing was restored
    assert_eq!(errors(&el.log), ["expected 'end'"]);
    assert!(el.cfg.rule(&rule_name).is_some());

    let mut el = new_elab();
    let mut source = SyntaxStream::new(vec![
      Syntax::node(BuiltinKind::Section, vec![]),
      Syntax::node(
        BuiltinKind::Notation,
        vec![
          Syntax::node(BuiltinKind::NotaLiteral, vec![Syntax::atom("~")]),
          Syntax::node(BuiltinKind::NotaSlot, vec![Syntax::ident("a")]),
          Syntax::ident("a"),
        ],
      ),
      end(None),
    ]);
    assert!(matches!(el.elab_commands(&mut source, 0), ScopeExit::Eoi));
    assert!(el.log.is_empty(), "{:?}", errors(&el.log));
    // the rule registered while the section was open, and went away with it
    assert!(el.cfg.rule(&rule_name).is_none());
    // the expander itself survives; only the parser stops producing the kind
    assert!(el.notations.get(&rule_name).is_some());
  }
}
