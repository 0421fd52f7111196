/// Declares a status enum and its explicit transition table.
///
/// Each state is serialized as its label and lists the states it may move
/// to. Staying in the same state is always allowed.
///
/// ```
/// recordkeep::lifecycle! {
///     pub enum OrderStatus {
///         Pending = "pending" => [Completed, Cancelled],
///         Completed = "completed" => [],
///         Cancelled = "cancelled" => [Pending],
///     }
/// }
///
/// use recordkeep::Lifecycle;
/// assert!(OrderStatus::Pending.can_become(OrderStatus::Completed));
/// assert!(!OrderStatus::Completed.can_become(OrderStatus::Pending));
/// assert_eq!(OrderStatus::from_label("cancelled"), Some(OrderStatus::Cancelled));
/// ```
#[macro_export]
macro_rules! lifecycle {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $variant:ident = $label:literal => [ $( $next:ident ),* $(,)? ] ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        $vis enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $crate::Lifecycle for $name {
            const ALL: &'static [Self] = &[ $( $name::$variant ),+ ];

            fn label(self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )+
                }
            }

            fn successors(self) -> &'static [Self] {
                match self {
                    $( $name::$variant => &[ $( $name::$next ),* ], )+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::Lifecycle::label(*self))
            }
        }
    };
}
