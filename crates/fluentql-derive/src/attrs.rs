//! `#[fql(...)]` attribute parsing shared by the derives.

use syn::{Attribute, Expr, ExprLit, Lit, Meta, Result};

/// Everything a single `#[fql(...)]` list can carry.
#[derive(Default)]
pub struct FqlAttrs {
    pub column: Option<String>,
    pub rename: Option<String>,
    pub repr: Option<String>,
    pub skip: bool,
}

pub fn parse(attrs: &[Attribute]) -> Result<FqlAttrs> {
    let mut parsed = FqlAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("fql") {
            continue;
        }
        let nested = attr.parse_args_with(
            syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated,
        )?;
        for meta in &nested {
            match meta {
                Meta::Path(path) if path.is_ident("skip") => parsed.skip = true,
                Meta::NameValue(nv) => {
                    let value = string_value(&nv.value)?;
                    if nv.path.is_ident("column") {
                        parsed.column = Some(value);
                    } else if nv.path.is_ident("rename") {
                        parsed.rename = Some(value);
                    } else if nv.path.is_ident("repr") {
                        parsed.repr = Some(value);
                    } else {
                        return Err(syn::Error::new_spanned(&nv.path, "unknown fql attribute"));
                    }
                }
                other => {
                    return Err(syn::Error::new_spanned(other, "unknown fql attribute"));
                }
            }
        }
    }
    Ok(parsed)
}

fn string_value(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}
