//! Call and reply values exchanged with the peer.
//!
//! # Design
//! `Term` is the interchange value for arguments, return values and
//! structured errors. Atoms are the only symbolic identifiers; everything
//! else is plain data. Replies at status 200 are themselves terms tagged with
//! the `success` or `exception` atom.

use std::fmt;

use serde::Serialize;

use crate::error::RemoteException;

pub const SUCCESS_TAG: &str = "success";
pub const EXCEPTION_TAG: &str = "exception";

/// A value in the term interchange format.
///
/// `Deserialize` is implemented in `codec` with a nesting bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Term {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Atom(String),
    Binary(Vec<u8>),
    List(Vec<Term>),
    Tuple(Vec<Term>),
    Map(Vec<(Term, Term)>),
}

impl Term {
    pub fn atom(name: &str) -> Self {
        Term::Atom(name.to_string())
    }

    pub fn binary(bytes: impl AsRef<[u8]>) -> Self {
        Term::Binary(bytes.as_ref().to_vec())
    }

    /// Every atom in the term, depth first.
    pub fn atoms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Term::Atom(name) => out.push(name),
            Term::List(items) | Term::Tuple(items) => {
                for item in items {
                    item.collect_atoms(out);
                }
            }
            Term::Map(pairs) => {
                for (key, value) in pairs {
                    key.collect_atoms(out);
                    value.collect_atoms(out);
                }
            }
            _ => {}
        }
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::Binary(value.as_bytes().to_vec())
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Term::Integer(value)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Nil => write!(f, "nil"),
            Term::Bool(b) => write!(f, "{b}"),
            Term::Integer(i) => write!(f, "{i}"),
            Term::Float(x) => write!(f, "{x:?}"),
            Term::Atom(name) => write!(f, "{name}"),
            Term::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => write!(f, "<<{text:?}>>"),
                Err(_) => write!(f, "<<{} bytes>>", bytes.len()),
            },
            Term::List(items) => write_seq(f, "[", items, "]"),
            Term::Tuple(items) => write_seq(f, "{", items, "}"),
            Term::Map(pairs) => {
                write!(f, "#{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key} => {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Term], close: &str) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "{close}")
}

/// A logical remote call: `version/module/function` applied to `args`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub version: String,
    pub module: String,
    pub function: String,
    pub args: Vec<Term>,
}

impl Call {
    pub fn new(version: &str, module: &str, function: &str, args: Vec<Term>) -> Self {
        Self {
            version: version.to_string(),
            module: module.to_string(),
            function: function.to_string(),
            args,
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// The two reply shapes a peer may send with status 200.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success(Term),
    Exception(RemoteException),
}

impl Reply {
    pub fn into_term(self) -> Term {
        match self {
            Reply::Success(value) => Term::Tuple(vec![Term::atom(SUCCESS_TAG), value]),
            Reply::Exception(RemoteException {
                class,
                reason,
                trace,
            }) => Term::Tuple(vec![Term::atom(EXCEPTION_TAG), class, reason, trace]),
        }
    }

    /// Returns `None` when the term is neither reply shape.
    pub fn from_term(term: Term) -> Option<Self> {
        let Term::Tuple(items) = term else {
            return None;
        };
        let mut items = items.into_iter();
        let Some(Term::Atom(tag)) = items.next() else {
            return None;
        };
        match (tag.as_str(), items.next(), items.next(), items.next(), items.next()) {
            (SUCCESS_TAG, Some(value), None, None, None) => Some(Reply::Success(value)),
            (EXCEPTION_TAG, Some(class), Some(reason), Some(trace), None) => {
                Some(Reply::Exception(RemoteException {
                    class,
                    reason,
                    trace,
                }))
            }
            _ => None,
        }
    }
}
