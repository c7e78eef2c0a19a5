//! Derive macros for sqlrow
//!
//! Provides `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod entity;

/// Derive the `Entity` trait for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use sqlrow::Entity;
///
/// #[derive(Entity)]
/// #[orm(table = "users")]
/// struct User {
///     id: Option<i64>,
///     #[orm(column = "email")]
///     address: String,
///     #[orm(skip)]
///     score: u32,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Table the struct maps to (required)
/// - `#[orm(column = "name")]` - Map a field to a different column name
/// - `#[orm(skip)]` - Leave a field unmapped; it is rebuilt with `Default`
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
