//! # Packed DFA Interpreter
//!
//! Executes the packed `u16` tokenizer tables described in
//! [`DfaTable`](crate::table::DfaTable): walk states from offset 0, record
//! the longest dialect-allowed accepting term into the stream's working
//! token, and follow binary-searched character-range edges until the group
//! mask rules out every reachable token or no edge matches.

use crate::lexer::InputStream;
use crate::table::{DfaTable, Dialect, NO_TERM};

/// Size in words of one `(from, to, target)` edge.
const EDGE_WORDS: usize = 3;

pub(crate) fn run(
    table: &DfaTable,
    stream: &mut InputStream<'_>,
    group_mask: u16,
    dialect: &Dialect,
) {
    let data = &table.data;
    let mut state = 0usize;
    loop {
        // No token reachable from here matches the active group.
        if data[state] & group_mask == 0 {
            return;
        }
        let acc_end = usize::from(data[state + 1]);
        let edge_end = usize::from(data[state + 2]);

        for pair in data[state + 3..acc_end].chunks_exact(2) {
            let (term, mask) = (pair[0], pair[1]);
            if mask & group_mask != 0 && dialect.allows(term) {
                // Reaching a later accepting state means a longer match,
                // which always overrides the current candidate.
                if stream.token().value == NO_TERM || stream.pos() >= stream.token().end {
                    stream.accept_token(term, 0);
                }
                break;
            }
        }

        let ch = stream.current();
        if ch < 0 {
            return;
        }
        let code = u16::try_from(ch).unwrap_or(u16::MAX);
        match find_edge(&data[acc_end..edge_end], code) {
            Some(target) => {
                state = usize::from(target);
                stream.advance_char();
            }
            None => return,
        }
    }
}

/// Binary search the sorted `(from, to, target)` edge list for the range
/// containing `code`. `to == u16::MAX` is an unbounded upper boundary.
fn find_edge(edges: &[u16], code: u16) -> Option<u16> {
    let count = edges.len() / EDGE_WORDS;
    let idx = {
        let mut lo = 0usize;
        let mut hi = count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if edges[mid * EDGE_WORDS] <= code {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    };
    if idx == 0 {
        return None;
    }
    let edge = &edges[(idx - 1) * EDGE_WORDS..idx * EDGE_WORDS];
    let to = edge[1];
    if to != u16::MAX && code >= to {
        return None;
    }
    Some(edge[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{InputStream, StringInput};
    use crate::table::{DfaTable, Dialect};

    // A DFA accepting "ab" as term 3:
    //   state 0 @0: mask 1, no accepts, edge 'a'..'b' -> state 6
    //   state 1 @6: mask 1, no accepts, edge 'b'..'c' -> state 12
    //   state 2 @12: mask 1, accepts (3, 1), no edges
    fn ab_table() -> DfaTable {
        DfaTable {
            data: vec![
                1, 3, 6, 97, 98, 6, //
                1, 9, 12, 98, 99, 12, //
                1, 17, 17, 3, 1,
            ]
            .into_boxed_slice(),
        }
    }

    #[test]
    fn matches_a_literal() {
        let mut input = StringInput::new("abx");
        let mut stream = InputStream::new(&mut input, &[]);
        run(&ab_table(), &mut stream, 1, &Dialect::all(7));
        assert_eq!(stream.token().value, 3);
        assert_eq!(stream.token().end, 2);
    }

    #[test]
    fn leaves_no_token_on_mismatch() {
        let mut input = StringInput::new("ax");
        let mut stream = InputStream::new(&mut input, &[]);
        run(&ab_table(), &mut stream, 1, &Dialect::all(7));
        assert_eq!(stream.token().value, NO_TERM);
    }

    #[test]
    fn group_mask_prunes_the_walk() {
        let mut input = StringInput::new("ab");
        let mut stream = InputStream::new(&mut input, &[]);
        // Group 1 is not in any state mask, so nothing matches.
        run(&ab_table(), &mut stream, 2, &Dialect::all(7));
        assert_eq!(stream.token().value, NO_TERM);
    }

    #[test]
    fn dialect_filters_accepting_terms() {
        let mut input = StringInput::new("ab");
        let mut stream = InputStream::new(&mut input, &[]);
        let mut dialect = Dialect::all(7);
        dialect.clear(3);
        run(&ab_table(), &mut stream, 1, &dialect);
        assert_eq!(stream.token().value, NO_TERM);
    }

    #[test]
    fn longest_match_wins() {
        // Accepts "a" as 3 and "aa" as 5.
        let table = DfaTable {
            data: vec![
                1, 3, 6, 97, 98, 6, //
                1, 11, 14, 3, 1, 97, 98, 14, //
                1, 19, 19, 5, 1,
            ]
            .into_boxed_slice(),
        };
        let mut input = StringInput::new("aa");
        let mut stream = InputStream::new(&mut input, &[]);
        run(&table, &mut stream, 1, &Dialect::all(7));
        assert_eq!(stream.token().value, 5);
        assert_eq!(stream.token().end, 2);
    }
}
