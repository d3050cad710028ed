//! Derive macros for fluentql
//!
//! Provides `#[derive(FromRow)]` and `#[derive(BindingEnum)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod binding_enum;
mod from_row;

/// Derive `FromRow` for a struct.
///
/// # Example
///
/// ```ignore
/// use fluentql::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: i64,
///     name: String,
///     #[fql(column = "email_address")]
///     email: Option<String>,
///     #[fql(skip)]
///     cached_rank: u32,
/// }
/// ```
///
/// # Attributes
///
/// - `#[fql(column = "name")]` - Read the field from a differently named column
/// - `#[fql(skip)]` - Leave the field at its `Default` value
#[proc_macro_derive(FromRow, attributes(fql))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive binding support for a fieldless enum.
///
/// Generates `From<Self>` and `From<&Self>` for `fluentql::Value` (bound as
/// an enum value, which is recast to its inner value when it is bound) and
/// `fluentql::FromValue` for decoding it back out of a row.
///
/// # Example
///
/// ```ignore
/// #[derive(BindingEnum)]
/// enum Status {
///     Active,
///     #[fql(rename = "on_hold")]
///     Paused,
/// }
///
/// query.where_eq("status", Status::Active);
/// ```
///
/// # Attributes
///
/// - `#[fql(repr = "int")]` on the enum - Bind the discriminant instead of the name
/// - `#[fql(rename = "name")]` on a variant - Override the snake_case name
#[proc_macro_derive(BindingEnum, attributes(fql))]
pub fn derive_binding_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    binding_enum::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
