//! `#[derive(BindingEnum)]`: bind a fieldless enum as a query parameter.

use crate::attrs;
use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

enum Repr {
    Text,
    Int,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    let variants = match &input.data {
        Data::Enum(e) => &e.variants,
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "BindingEnum can only be derived for enums",
            ));
        }
    };

    let repr = match attrs::parse(&input.attrs)?.repr.as_deref() {
        None | Some("text") => Repr::Text,
        Some("int") => Repr::Int,
        Some(other) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                format!("unsupported repr {other:?}, expected \"text\" or \"int\""),
            ));
        }
    };

    let mut to_value_arms = Vec::new();
    let mut from_value_arms = Vec::new();

    for variant in variants {
        if !matches!(&variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "BindingEnum variants must be unit variants (no fields)",
            ));
        }

        let variant_ident = &variant.ident;
        match repr {
            Repr::Text => {
                let bound = attrs::parse(&variant.attrs)?
                    .rename
                    .unwrap_or_else(|| variant_ident.to_string().to_snake_case());
                to_value_arms.push(quote! {
                    #name::#variant_ident => ::fluentql::Value::Text(#bound.to_string()),
                });
                from_value_arms.push(quote! {
                    Some(#bound) => Ok(#name::#variant_ident),
                });
            }
            Repr::Int => {
                to_value_arms.push(quote! {
                    #name::#variant_ident => ::fluentql::Value::Int(#name::#variant_ident as i64),
                });
                from_value_arms.push(quote! {
                    Some(n) if n == #name::#variant_ident as i64 => Ok(#name::#variant_ident),
                });
            }
        }
    }

    let decode = match repr {
        Repr::Text => quote! {
            match value.as_str() {
                #(#from_value_arms)*
                other => Err(::std::format!(
                    "unknown {} variant: {:?}",
                    ::std::stringify!(#name),
                    other
                )),
            }
        },
        Repr::Int => quote! {
            match value.as_i64() {
                #(#from_value_arms)*
                other => Err(::std::format!(
                    "unknown {} variant: {:?}",
                    ::std::stringify!(#name),
                    other
                )),
            }
        },
    };

    Ok(quote! {
        impl ::std::convert::From<&#name> for ::fluentql::Value {
            fn from(value: &#name) -> Self {
                let inner = match value {
                    #(#to_value_arms)*
                };
                ::fluentql::Value::Enum(::std::boxed::Box::new(inner))
            }
        }

        impl ::std::convert::From<#name> for ::fluentql::Value {
            fn from(value: #name) -> Self {
                ::fluentql::Value::from(&value)
            }
        }

        impl ::fluentql::FromValue for #name {
            fn from_value(value: &::fluentql::Value) -> ::std::result::Result<Self, ::std::string::String> {
                #decode
            }
        }
    })
}
