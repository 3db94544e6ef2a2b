/// Declares typed column constants for a record struct.
///
/// Every `field: Type = id` entry becomes an associated constant named after
/// the field in upper case, and `columns()` returns all of them in
/// declaration order for use as a split table's column list.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use tabkv::{Column, columns};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Demo {
///     owner: String,
///     title: String,
///     like_count: u64,
/// }
///
/// columns![Demo {
///     owner: String = 1,
///     title: String = 2,
///     like_count: u64 = 3,
/// }];
///
/// let column: Column<Demo, u64> = Demo::LIKE_COUNT;
/// assert_eq!(column.name(), "like_count");
/// assert_eq!(Demo::columns().len(), 3);
/// ```
///
/// # Compilation Errors
///
/// Every column needs an explicit numeric id, since ids are part of the
/// stored keys and must not depend on declaration order:
///
/// ```compile_fail
/// use tabkv::columns;
///
/// #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
/// struct Demo {
///     owner: String,
/// }
///
/// columns![Demo { owner: String }];
/// ```
#[macro_export]
macro_rules! columns {
    ($record:ident { $($field:ident : $ty:ty = $id:literal),+ $(,)? }) => {
        $crate::paste! {
            impl $record {
                $(
                    pub const [<$field:upper>]: $crate::Column<$record, $ty> = {
                        fn get(record: &$record) -> &$ty {
                            &record.$field
                        }
                        fn get_mut(record: &mut $record) -> &mut $ty {
                            &mut record.$field
                        }
                        $crate::Column::new(::core::stringify!($field), $id, get, get_mut)
                    };
                )+

                /// All declared columns, in declaration order.
                pub fn columns() -> ::std::vec::Vec<$crate::FieldRef<$record>> {
                    ::std::vec![$($crate::Column::erase(Self::[<$field:upper>])),+]
                }
            }
        }
    };
}
