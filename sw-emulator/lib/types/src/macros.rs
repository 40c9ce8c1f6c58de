/*++

Licensed under the Apache-2.0 license.

File Name:

    macros.rs

Abstract:

    Macros used by the project

--*/

/// Declares a C-like enum whose variants map to fixed raw values, plus a
/// catch-all variant for raw values with no mapping.
///
/// Generated items:
///
/// * `From<raw>` for the enum, decoding unknown values to the catch-all
/// * `value()`, returning the raw value or `None` for the catch-all
/// * `Display`, printing the variant name
///
/// Register fields holding an enumerated value are stored raw and decoded
/// with `From` at the point of use.
#[macro_export]
macro_rules! emu_enum {
    (
        $(#[$($enum_attrs:tt)*])*
        $vis:vis $enum_name:ident;
        $type:ty;
        {
            $(
                $(#[$($attrs:tt)*])*
                $name:ident = $value:literal,
            )*
        };
        $invalid:ident
    ) => {
        $(#[$($enum_attrs)*])*
        $vis enum $enum_name {
            $(
                $(#[$($attrs)*])*
                $name,
            )*
            $invalid
        }

        impl $enum_name {
            /// Raw encoding of this variant
            #[allow(dead_code)]
            $vis fn value(self) -> Option<$type> {
                match self {
                    $($enum_name::$name => Some($value),)*
                    $enum_name::$invalid => None,
                }
            }
        }

        impl From<$type> for $enum_name {
            fn from(val: $type) -> $enum_name {
                match val {
                    $($value => $enum_name::$name,)*
                    _ => $enum_name::$invalid,
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                match self {
                    $($enum_name::$name => write!(f, stringify!($name)),)*
                    $enum_name::$invalid => write!(f, stringify!($invalid)),
                }
            }
        }
    };
}
