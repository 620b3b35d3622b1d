//! # Accessor Derive
//!
//! Derive macro generating builder-style setters and, on request, `const`
//! getters for the named fields of a configuration struct.

use proc_macro::TokenStream;
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Field, Fields, LitBool, parse_macro_input, spanned::Spanned};

/// Derive to generate, for each **named** field:
///
/// - `.set_<field>(&mut self, value: Ty) -> &mut Self`
/// - `const .with_<field>(mut self, value: Ty) -> Self`
/// - `const .<field>(&self) -> Ty` when the field or the struct carries
///   `#[setters(get)]` (the field type must be `Copy`)
///
/// A field is left out entirely with `#[setters(skip)]` (or `skip = true`).
/// Doc comments on a field are copied onto its generated methods.
///
/// # Example
///
/// ```
/// use utils_accessors_derive::Setters;
///
/// #[derive(Clone, Copy, Default, Setters)]
/// #[setters(get)]
/// struct Limits {
///     /// Highest usable page.
///     highest: u32,
///     #[setters(skip)]
///     _reserved: u8,
/// }
///
/// let mut l = Limits::default();
/// l.set_highest(10).set_highest(11);
/// let l2 = l.with_highest(42);
/// assert_eq!(l2.highest(), 42);
/// ```
#[proc_macro_derive(Setters, attributes(setters))]
pub fn derive_generate_setters(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into_token_stream().into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Options parsed from a `#[setters(...)]` attribute list.
#[derive(Default, Clone, Copy)]
struct Options {
    skip: bool,
    get: bool,
}

fn expand(input: &DeriveInput) -> syn::Result<impl ToTokens> {
    let ident = &input.ident;
    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(n) => &n.named,
            Fields::Unnamed(u) => {
                return Err(syn::Error::new(u.span(), "Setters only supports named fields"));
            }
            Fields::Unit => {
                return Err(syn::Error::new(
                    ident.span(),
                    "Setters does not apply to unit structs",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                ident.span(),
                "Setters can only be derived for structs",
            ));
        }
    };

    let defaults = parse_options(&input.attrs)?;
    let mut methods = Vec::new();
    for field in fields {
        methods.push(field_methods(field, defaults)?);
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics #ident #ty_generics #where_clause {
            #(#methods)*
        }
    })
}

fn field_methods(field: &Field, defaults: Options) -> syn::Result<impl ToTokens + use<>> {
    let Some(fname) = &field.ident else {
        return Ok(quote! {});
    };

    let own = parse_options(&field.attrs)?;
    if own.skip {
        return Ok(quote! {});
    }

    let ty = &field.ty;
    let docs: Vec<&Attribute> = field
        .attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .collect();
    let set_name = format_ident!("set_{}", fname);
    let with_name = format_ident!("with_{}", fname);

    let getter = if own.get || defaults.get {
        quote! {
            #(#docs)*
            #[inline]
            #[must_use]
            pub const fn #fname(&self) -> #ty {
                self.#fname
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        #getter

        #(#docs)*
        #[inline]
        pub fn #set_name(&mut self, value: #ty) -> &mut Self {
            self.#fname = value;
            self
        }

        #(#docs)*
        #[inline]
        #[must_use]
        pub const fn #with_name(mut self, value: #ty) -> Self {
            self.#fname = value;
            self
        }
    })
}

/// Accepts `#[setters(skip)]`, `#[setters(skip = true)]` and `#[setters(get)]`,
/// in any combination.
fn parse_options(attrs: &[Attribute]) -> syn::Result<Options> {
    let mut options = Options::default();
    for attr in attrs {
        if !attr.path().is_ident("setters") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let flag = if meta.input.is_empty() || meta.input.peek(syn::Token![,]) {
                true
            } else {
                meta.value()?.parse::<LitBool>()?.value
            };

            if meta.path.is_ident("skip") {
                options.skip = flag;
                Ok(())
            } else if meta.path.is_ident("get") {
                options.get = flag;
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `get`"))
            }
        })?;
    }
    Ok(options)
}
