/// Convenient macro for constructing a map [`Value`][crate::Value].
///
/// Keys can be identifiers or string literals, values can be `nil`, nested
/// lists `[..]`, nested maps `{..}` or any expression implementing
/// `Into<Value>`.
///
/// # Examples
///
/// ```
/// let env = sluice::value! {
///     user: { name: "John Smith", tags: ["a", "b"] },
///     "content-type": "text/html",
///     missing: nil,
///     count: 1 + 2,
/// };
/// ```
#[macro_export]
macro_rules! value {
    ($($tt:tt)*) => {{
        let mut map = $crate::value::Map::new();
        $crate::_value!(@map map $($tt)*);
        $crate::Value::Map(map)
    }};
}

#[macro_export]
#[doc(hidden)]
macro_rules! _value {
    //////////////////////////////////////////////////////////////////////////
    // TT muncher for the inside of a list [...].
    //////////////////////////////////////////////////////////////////////////

    (@list [$($elems:expr,)*]) => {
        $crate::Value::List(vec![$($elems,)*])
    };

    (@list [$($elems:expr,)*] , $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)*] $($rest)*)
    };

    (@list [$($elems:expr,)*] nil $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)* $crate::Value::Nil,] $($rest)*)
    };

    (@list [$($elems:expr,)*] [$($list:tt)*] $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)* $crate::_value!([$($list)*]),] $($rest)*)
    };

    (@list [$($elems:expr,)*] {$($map:tt)*} $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)* $crate::value!($($map)*),] $($rest)*)
    };

    (@list [$($elems:expr,)*] $next:expr , $($rest:tt)*) => {
        $crate::_value!(@list [$($elems,)* $crate::Value::from($next),] $($rest)*)
    };

    (@list [$($elems:expr,)*] $last:expr) => {
        $crate::_value!(@list [$($elems,)* $crate::Value::from($last),])
    };

    //////////////////////////////////////////////////////////////////////////
    // TT muncher for the inside of a map {...}. Each entry is inserted into
    // the given map variable.
    //////////////////////////////////////////////////////////////////////////

    (@map $map:ident) => {};

    (@map $map:ident , $($rest:tt)*) => {
        $crate::_value!(@map $map $($rest)*);
    };

    (@map $map:ident $key:tt : nil $($rest:tt)*) => {
        let _ = $map.insert($crate::_value!(@key $key), $crate::Value::Nil);
        $crate::_value!(@map $map $($rest)*);
    };

    (@map $map:ident $key:tt : [$($list:tt)*] $($rest:tt)*) => {
        let _ = $map.insert($crate::_value!(@key $key), $crate::_value!([$($list)*]));
        $crate::_value!(@map $map $($rest)*);
    };

    (@map $map:ident $key:tt : {$($inner:tt)*} $($rest:tt)*) => {
        let _ = $map.insert($crate::_value!(@key $key), $crate::value!($($inner)*));
        $crate::_value!(@map $map $($rest)*);
    };

    (@map $map:ident $key:tt : $value:expr , $($rest:tt)*) => {
        let _ = $map.insert($crate::_value!(@key $key), $crate::Value::from($value));
        $crate::_value!(@map $map $($rest)*);
    };

    (@map $map:ident $key:tt : $value:expr) => {
        let _ = $map.insert($crate::_value!(@key $key), $crate::Value::from($value));
    };

    (@key $key:ident) => {
        ::std::string::String::from(stringify!($key))
    };

    (@key $key:literal) => {
        ::std::string::String::from($key)
    };

    //////////////////////////////////////////////////////////////////////////
    // Single values
    //////////////////////////////////////////////////////////////////////////

    (nil) => {
        $crate::Value::Nil
    };

    ([$($tt:tt)*]) => {
        $crate::_value!(@list [] $($tt)*)
    };

    ({$($tt:tt)*}) => {
        $crate::value!($($tt)*)
    };

    ($other:expr) => {
        $crate::Value::from($other)
    };
}
