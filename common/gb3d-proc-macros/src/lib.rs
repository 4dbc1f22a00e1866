mod enums;

use proc_macro::TokenStream;

/// Implement `Display` and a `to_str()` method that return each variant's name.
///
/// Only fieldless enums are supported.
#[proc_macro_derive(EnumDisplay)]
pub fn enum_display(input: TokenStream) -> TokenStream {
    enums::enum_display(input)
}

/// Add an `ALL` constant that lists every variant in declaration order.
///
/// Only fieldless enums are supported.
#[proc_macro_derive(EnumAll)]
pub fn enum_all(input: TokenStream) -> TokenStream {
    enums::enum_all(input)
}
