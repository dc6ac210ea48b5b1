/// Invoke `$m!` once per non-empty prefix of an identifier list.
///
/// `tuple_prefixes!(m; ; A, B, C)` expands to `m!(A); m!(A, B); m!(A, B, C);`.
macro_rules! tuple_prefixes {
    ($m:ident; $($done:ident),*; ) => {};
    ($m:ident; ; $head:ident $(, $tail:ident)*) => {
        $m!($head);
        $crate::ecs::util::tuple_prefixes!($m; $head; $($tail),*);
    };
    ($m:ident; $($done:ident),+; $head:ident $(, $tail:ident)*) => {
        $m!($($done,)+ $head);
        $crate::ecs::util::tuple_prefixes!($m; $($done,)+ $head; $($tail),*);
    };
}

/// Apply a macro to every tuple arity from 1 to 26, with type parameters named `A` to `Z`.
macro_rules! all_tuples {
    ($m:ident) => {
        $crate::ecs::util::tuple_prefixes!(
            $m; ; A, B, C, D, E, F, G, H, I, J, K, L, M, N, O, P, Q, R, S, T, U, V, W, X, Y, Z
        );
    };
}

pub(crate) use all_tuples;
pub(crate) use tuple_prefixes;
