//! Term codec: `Term` values to and from the binary interchange format.
//!
//! # Design
//! Terms are written with bincode's serde integration using the standard
//! configuration. Decoding is bounded by `DECODE_LIMIT` and refuses trailing
//! bytes.
//!
//! Atoms name things in the peer's runtime, so a hostile peer could try to
//! flood a caller with fresh ones. Unless the caller opts into unsafe
//! decoding, every decoded atom must already be present in the caller's
//! `SymbolTable`. Decoding never adds to the table.
//!
//! Lists, tuples and maps nest at most `MAX_DEPTH` levels deep. The bound is
//! enforced while deserializing, before any deeper value is built.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt;

use serde::de::{self, DeserializeSeed, EnumAccess, SeqAccess, VariantAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::DecodeError;
use crate::types::Term;

/// Media type used for both `accept` and `content-type`.
pub const TERM_MEDIA_TYPE: &str = "application/x-termrpc-bincode";

pub const DECODE_LIMIT: usize = 16 * 1024 * 1024;

/// Deepest nesting of lists, tuples and maps accepted when decoding.
pub const MAX_DEPTH: usize = 128;

const BUILTIN_SYMBOLS: &[&str] = &[
    "nil",
    "true",
    "false",
    "ok",
    "error",
    "undefined",
    "success",
    "exception",
    "throw",
    "exit",
    "badarg",
    "badarity",
    "undef",
];

/// The set of atoms the local runtime already knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: BTreeSet<String>,
}

impl SymbolTable {
    /// A table holding only the built-in symbols.
    pub fn new() -> Self {
        Self::empty().with(BUILTIN_SYMBOLS.iter().copied())
    }

    pub fn empty() -> Self {
        Self {
            symbols: BTreeSet::new(),
        }
    }

    pub fn with<'a>(mut self, symbols: impl IntoIterator<Item = &'a str>) -> Self {
        for symbol in symbols {
            self.insert(symbol);
        }
        self
    }

    pub fn insert(&mut self, symbol: &str) {
        self.symbols.insert(symbol.to_string());
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

pub fn encode_term(term: &Term) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::serde::encode_to_vec(term, bincode::config::standard())
}

/// Call arguments travel as a single list term.
pub fn encode_args(args: &[Term]) -> Result<Vec<u8>, bincode::error::EncodeError> {
    encode_term(&Term::List(args.to_vec()))
}

pub fn decode_term(
    bytes: &[u8],
    allow_unsafe: bool,
    symbols: &SymbolTable,
) -> Result<Term, DecodeError> {
    let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
    let too_deep = Cell::new(false);
    let decoded = bincode::serde::seed_decode_from_slice(TermSeed::root(&too_deep), bytes, config);
    let (term, read) = decoded.map_err(|err| {
        if too_deep.get() {
            DecodeError::TooDeep(MAX_DEPTH)
        } else {
            DecodeError::Malformed(err)
        }
    })?;
    if read != bytes.len() {
        return Err(DecodeError::TrailingBytes(bytes.len() - read));
    }
    if !allow_unsafe {
        if let Some(unknown) = term.atoms().into_iter().find(|atom| !symbols.contains(atom)) {
            return Err(DecodeError::UnsafeSymbol(unknown.to_string()));
        }
    }
    Ok(term)
}

/// Variant tags, in declaration order.
#[derive(Deserialize)]
#[serde(variant_identifier)]
enum Kind {
    Nil,
    Bool,
    Integer,
    Float,
    Atom,
    Binary,
    List,
    Tuple,
    Map,
}

const VARIANTS: &[&str] = &[
    "Nil", "Bool", "Integer", "Float", "Atom", "Binary", "List", "Tuple", "Map",
];

/// Deserializes one term at `depth`, flagging `too_deep` when the bound is
/// crossed so the caller can tell it apart from malformed input.
#[derive(Clone, Copy)]
struct TermSeed<'a> {
    depth: usize,
    too_deep: &'a Cell<bool>,
}

impl<'a> TermSeed<'a> {
    fn root(too_deep: &'a Cell<bool>) -> Self {
        Self { depth: 0, too_deep }
    }

    fn nested(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }
}

impl<'de> DeserializeSeed<'de> for TermSeed<'_> {
    type Value = Term;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Term, D::Error> {
        if self.depth > MAX_DEPTH {
            self.too_deep.set(true);
            return Err(de::Error::custom(format_args!(
                "term nesting exceeds {MAX_DEPTH} levels"
            )));
        }
        deserializer.deserialize_enum("Term", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for TermSeed<'_> {
    type Value = Term;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a term")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Term, A::Error> {
        let (kind, variant) = data.variant::<Kind>()?;
        let term = match kind {
            Kind::Nil => {
                variant.unit_variant()?;
                Term::Nil
            }
            Kind::Bool => Term::Bool(variant.newtype_variant()?),
            Kind::Integer => Term::Integer(variant.newtype_variant()?),
            Kind::Float => Term::Float(variant.newtype_variant()?),
            Kind::Atom => Term::Atom(variant.newtype_variant()?),
            Kind::Binary => Term::Binary(variant.newtype_variant()?),
            Kind::List => Term::List(variant.newtype_variant_seed(Items(self.nested()))?),
            Kind::Tuple => Term::Tuple(variant.newtype_variant_seed(Items(self.nested()))?),
            Kind::Map => Term::Map(variant.newtype_variant_seed(Pairs(self.nested()))?),
        };
        Ok(term)
    }
}

/// Cap on preallocation from a length prefix the peer controls.
const MAX_PREALLOCATED: usize = 4096;

/// The elements of a list or tuple.
struct Items<'a>(TermSeed<'a>);

impl<'de> DeserializeSeed<'de> for Items<'_> {
    type Value = Vec<Term>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<Term>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for Items<'_> {
    type Value = Vec<Term>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of terms")
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<Vec<Term>, S::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(MAX_PREALLOCATED));
        while let Some(item) = seq.next_element_seed(self.0)? {
            items.push(item);
        }
        Ok(items)
    }
}

/// The key/value pairs of a map.
struct Pairs<'a>(TermSeed<'a>);

impl<'de> DeserializeSeed<'de> for Pairs<'_> {
    type Value = Vec<(Term, Term)>;

    fn deserialize<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<Vec<(Term, Term)>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for Pairs<'_> {
    type Value = Vec<(Term, Term)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of key/value pairs")
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<Vec<(Term, Term)>, S::Error> {
        let mut pairs = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(MAX_PREALLOCATED));
        while let Some(pair) = seq.next_element_seed(Pair(self.0))? {
            pairs.push(pair);
        }
        Ok(pairs)
    }
}

struct Pair<'a>(TermSeed<'a>);

impl<'de> DeserializeSeed<'de> for Pair<'_> {
    type Value = (Term, Term);

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(Term, Term), D::Error> {
        deserializer.deserialize_tuple(2, self)
    }
}

impl<'de> Visitor<'de> for Pair<'_> {
    type Value = (Term, Term);

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a key/value pair")
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<(Term, Term), S::Error> {
        let key = seq
            .next_element_seed(self.0)?
            .ok_or_else(|| <S::Error as de::Error>::invalid_length(0, &self))?;
        let value = seq
            .next_element_seed(self.0)?
            .ok_or_else(|| <S::Error as de::Error>::invalid_length(1, &self))?;
        Ok((key, value))
    }
}

impl<'de> Deserialize<'de> for Term {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let too_deep = Cell::new(false);
        TermSeed::root(&too_deep).deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Term {
        Term::Tuple(vec![
            Term::atom("ok"),
            Term::from("hello"),
            Term::Map(vec![(Term::Integer(-3), Term::Float(1.5))]),
            Term::List(vec![Term::Bool(true), Term::Nil]),
        ])
    }

    #[test]
    fn known_symbols_decode_safely() {
        let bytes = encode_term(&sample()).unwrap();
        let term = decode_term(&bytes, false, &SymbolTable::new()).unwrap();
        assert_eq!(term, sample());
    }

    #[test]
    fn unknown_symbol_is_rejected_unless_unsafe() {
        let term = Term::List(vec![Term::atom("never_seen_before")]);
        let bytes = encode_term(&term).unwrap();
        let symbols = SymbolTable::new();

        let err = decode_term(&bytes, false, &symbols).unwrap_err();
        assert!(matches!(err, DecodeError::UnsafeSymbol(ref s) if s == "never_seen_before"));

        assert_eq!(decode_term(&bytes, true, &symbols).unwrap(), term);
        assert!(!symbols.contains("never_seen_before"));
    }

    #[test]
    fn registered_symbols_are_known() {
        let term = Term::atom("custom");
        let bytes = encode_term(&term).unwrap();
        let symbols = SymbolTable::new().with(["custom"]);
        assert_eq!(decode_term(&bytes, false, &symbols).unwrap(), term);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode_term(&Term::Integer(7)).unwrap();
        bytes.push(0);
        let err = decode_term(&bytes, false, &SymbolTable::new()).unwrap_err();
        assert!(matches!(err, DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = decode_term(b"\xff\xff\xff", true, &SymbolTable::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    /// `levels` one-element lists around `nil`, encoded without building the
    /// term.
    fn nested_lists(levels: usize) -> Vec<u8> {
        let nil = encode_term(&Term::Nil).unwrap();
        let wrapper = encode_term(&Term::List(vec![Term::Nil])).unwrap();
        let mut bytes = wrapper[..wrapper.len() - nil.len()].repeat(levels);
        bytes.extend_from_slice(&nil);
        bytes
    }

    fn nested_term(levels: usize) -> Term {
        (0..levels).fold(Term::Nil, |inner, _| Term::List(vec![inner]))
    }

    #[test]
    fn nesting_up_to_max_depth_decodes() {
        let bytes = nested_lists(MAX_DEPTH);
        assert_eq!(bytes, encode_term(&nested_term(MAX_DEPTH)).unwrap());
        assert_eq!(
            decode_term(&bytes, false, &SymbolTable::new()).unwrap(),
            nested_term(MAX_DEPTH)
        );
    }

    #[test]
    fn nesting_past_max_depth_is_too_deep() {
        for levels in [MAX_DEPTH + 1, 200_000] {
            let err = decode_term(&nested_lists(levels), true, &SymbolTable::new()).unwrap_err();
            assert!(matches!(err, DecodeError::TooDeep(MAX_DEPTH)), "{levels}: {err}");
        }
    }

    #[test]
    fn nested_maps_count_towards_depth() {
        let deep = nested_term(MAX_DEPTH);
        let term = Term::Map(vec![(Term::atom("ok"), deep)]);
        let bytes = encode_term(&term).unwrap();
        let err = decode_term(&bytes, false, &SymbolTable::new()).unwrap_err();
        assert!(matches!(err, DecodeError::TooDeep(_)));
    }

    #[test]
    fn args_are_a_list() {
        let args = vec![Term::from("a"), Term::Integer(2)];
        let bytes = encode_args(&args).unwrap();
        assert_eq!(
            decode_term(&bytes, false, &SymbolTable::new()).unwrap(),
            Term::List(args)
        );
    }
}
