use crate::term::PidOrAtom;
use eetf::{Atom, DecodeError, FixInteger, List, Pid, Reference, Term};

pub trait TryFromTerm: Sized {
    fn try_from_term(term: Term) -> Result<Self, DecodeError>;
}

impl TryFromTerm for Term {
    fn try_from_term(term: Term) -> Result<Self, DecodeError> {
        Ok(term)
    }
}

impl TryFromTerm for Pid {
    fn try_from_term(term: Term) -> Result<Self, DecodeError> {
        try_from_term(term, "pid")
    }
}

impl TryFromTerm for Atom {
    fn try_from_term(term: Term) -> Result<Self, DecodeError> {
        try_from_term(term, "atom")
    }
}

impl TryFromTerm for Reference {
    fn try_from_term(term: Term) -> Result<Self, DecodeError> {
        try_from_term(term, "reference")
    }
}

impl TryFromTerm for FixInteger {
    fn try_from_term(term: Term) -> Result<Self, DecodeError> {
        try_from_term(term, "integer")
    }
}

impl TryFromTerm for List {
    fn try_from_term(term: Term) -> Result<Self, DecodeError> {
        try_from_term(term, "list")
    }
}

impl TryFromTerm for PidOrAtom {
    fn try_from_term(term: Term) -> Result<Self, DecodeError> {
        term.try_into()
            .map(Self::Pid)
            .or_else(|term| term.try_into().map(Self::Atom))
            .map_err(|value| DecodeError::UnexpectedType {
                value,
                expected: "pid or atom".to_owned(),
            })
    }
}

pub fn try_from_term<T>(term: Term, expected: &str) -> Result<T, DecodeError>
where
    Term: TryInto<T, Error = Term>,
{
    term.try_into()
        .map_err(|value| DecodeError::UnexpectedType {
            value,
            expected: expected.to_owned(),
        })
}
