//! Entity derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

use crate::attrs::{field_attrs, struct_attrs};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let table = struct_attrs(&input.attrs)?.table.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "Entity requires #[orm(table = \"table_name\")] attribute",
        )
    })?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let mut columns = Vec::new();
    let mut to_record = Vec::new();
    let mut from_record = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attrs = field_attrs(&field.attrs)?;
        if attrs.skip {
            from_record.push(quote! {
                #ident: ::std::default::Default::default()
            });
            continue;
        }

        let column = attrs.column.unwrap_or_else(|| ident.to_string());
        if columns.contains(&column) {
            return Err(syn::Error::new_spanned(
                field,
                format!("column '{column}' is mapped twice"),
            ));
        }
        to_record.push(quote! {
            record.insert(
                ::std::string::String::from(#column),
                ::sqlrow::Value::from(::std::clone::Clone::clone(&self.#ident)),
            );
        });
        from_record.push(quote! {
            #ident: ::sqlrow::decode(record, #column)?
        });
        columns.push(column);
    }

    Ok(quote! {
        impl #impl_generics ::sqlrow::Entity for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;

            fn columns() -> &'static [&'static str] {
                &[#(#columns),*]
            }

            fn to_record(&self) -> ::sqlrow::Record {
                let mut record = ::sqlrow::Record::new();
                #(#to_record)*
                record
            }

            fn from_record(record: &::sqlrow::Record) -> ::sqlrow::OrmResult<Self> {
                Ok(Self {
                    #(#from_record),*
                })
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_str(src: &str) -> Result<String> {
        let input: DeriveInput = syn::parse_str(src)?;
        expand(input).map(|tokens| tokens.to_string())
    }

    #[test]
    fn maps_renamed_and_skipped_fields() {
        let out = expand_str(
            r#"
            #[orm(table = "users")]
            struct User {
                id: Option<i64>,
                #[orm(column = "email")]
                address: String,
                #[orm(skip)]
                rank: u32,
            }
            "#,
        )
        .unwrap();
        assert!(out.contains("\"users\""));
        assert!(out.contains("\"email\""));
        assert!(!out.contains("\"address\""));
        assert!(!out.contains("\"rank\""));
        assert!(out.contains("Default"));
    }

    #[test]
    fn requires_table() {
        let err = expand_str("struct User { id: i64 }").unwrap_err();
        assert!(err.to_string().contains("orm(table"));
    }

    #[test]
    fn rejects_tuple_structs_and_duplicates() {
        assert!(expand_str("#[orm(table = \"t\")] struct Pair(i64, i64);").is_err());
        assert!(
            expand_str(
                "#[orm(table = \"t\")] struct T { a: i64, #[orm(column = \"a\")] b: i64 }"
            )
            .is_err()
        );
        assert!(expand_str("#[orm(table = \"t\", schema = \"x\")] struct T { a: i64 }").is_err());
    }
}
