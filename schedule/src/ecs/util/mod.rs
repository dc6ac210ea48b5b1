mod macros;

pub(crate) use macros::{all_tuples, tuple_prefixes};

/// Strip module paths from a type name, keeping generic structure.
///
/// `alloc::vec::Vec<my_game::Position>` becomes `Vec<Position>`.
pub(crate) fn short_name(full_name: &str) -> String {
    const SPECIAL: &[char] = &[' ', '<', '>', '(', ')', '[', ']', ',', ';', '&'];

    let mut parsed = String::with_capacity(full_name.len());
    let mut remaining = full_name;
    loop {
        let segment_end = remaining.find(SPECIAL).unwrap_or(remaining.len());
        let segment = &remaining[..segment_end];
        parsed.push_str(segment.rsplit("::").next().unwrap_or(segment));

        match remaining[segment_end..].chars().next() {
            Some(special) => {
                parsed.push(special);
                remaining = &remaining[segment_end + special.len_utf8()..];
            }
            None => break,
        }
    }
    parsed
}
