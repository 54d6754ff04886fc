//! The functions the mock peer exposes.

use termrpc_core::{Reply, RemoteException, Term};

const MAX_DUPLICATES: i64 = 100_000;

/// Run `module.function` on `args`. `None` means no such function.
pub fn dispatch(module: &str, function: &str, args: &[Term]) -> Option<Reply> {
    let reply = match (module, function, args) {
        ("string", "length", [Term::Binary(bytes)]) => {
            Reply::Success(Term::Integer(bytes.len() as i64))
        }
        ("string", "length", [_]) => badarg("string:length/1"),
        ("lists", "duplicate", [Term::Integer(n), item]) if (0..=MAX_DUPLICATES).contains(n) => {
            Reply::Success(Term::List(vec![item.clone(); *n as usize]))
        }
        ("lists", "duplicate", [_, _]) => badarg("lists:duplicate/2"),
        ("kernel", "echo", [value]) => Reply::Success(value.clone()),
        ("erlang", "error", [reason]) => raise(reason.clone(), "erlang:error/1"),
        _ => return None,
    };
    Some(reply)
}

fn badarg(location: &str) -> Reply {
    raise(Term::atom("badarg"), location)
}

fn raise(reason: Term, location: &str) -> Reply {
    Reply::Exception(RemoteException {
        class: Term::atom("error"),
        reason,
        trace: Term::List(vec![Term::from(location)]),
    })
}
