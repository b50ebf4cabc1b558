//! Statecraft Macros - Proc macros for module registration
//!
//! This crate provides the `#[module]` attribute for impl blocks. Every
//! associated function marked with `#[method(name = "...")]` inside the block
//! becomes a registry entry: its display name, parameter list, return kind,
//! doc comment and a type-erased invocation thunk.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, Expr, FnArg, ImplItem, ImplItemFn, ItemImpl, Lit, LitStr, Meta, Pat,
    ReturnType, Token, Type,
};

/// Parsed attributes for the module macro
#[derive(Default)]
struct ModuleAttrs {
    name: Option<String>,
}

impl Parse for ModuleAttrs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut attrs = ModuleAttrs::default();

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "name" => {
                    let lit: LitStr = input.parse()?;
                    attrs.name = Some(lit.value());
                }
                _ => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {}", ident),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(attrs)
    }
}

/// Parsed attributes for a `#[method]` marker
struct MethodAttrs {
    name: String,
}

impl Parse for MethodAttrs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        // Shorthand: #[method("Player/is alive")]
        if input.peek(LitStr) {
            let lit: LitStr = input.parse()?;
            return Ok(MethodAttrs { name: lit.value() });
        }

        let mut name = None;
        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "name" => {
                    let lit: LitStr = input.parse()?;
                    name = Some(lit.value());
                }
                _ => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {}", ident),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(MethodAttrs {
            name: name.ok_or_else(|| input.error("missing required attribute 'name'"))?,
        })
    }
}

/// Extract doc comments from attributes
fn extract_doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let docs: Vec<String> = attrs
        .iter()
        .filter_map(|attr| {
            if attr.path().is_ident("doc") {
                if let Meta::NameValue(meta) = &attr.meta {
                    if let Expr::Lit(expr_lit) = &meta.value {
                        if let Lit::Str(s) = &expr_lit.lit {
                            return Some(s.value().trim().to_string());
                        }
                    }
                }
            }
            None
        })
        .collect();

    if docs.is_empty() {
        None
    } else {
        Some(docs.join("\n"))
    }
}

/// Derive the module name from the impl's self type (e.g. `PlayerModule`)
fn derive_module_name(self_ty: &Type) -> String {
    match self_ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_default(),
        other => other.to_token_stream().to_string().replace(' ', ""),
    }
}

/// Declared return type, or `None` for `()`
fn return_type(output: &ReturnType) -> Option<&Type> {
    match output {
        ReturnType::Default => None,
        ReturnType::Type(_, ty) => match &**ty {
            Type::Tuple(t) if t.elems.is_empty() => None,
            ty => Some(ty),
        },
    }
}

/// Take the `#[method]` marker off a function, returning its parsed contents
fn take_method_attr(func: &mut ImplItemFn) -> syn::Result<Option<MethodAttrs>> {
    let Some(pos) = func.attrs.iter().position(|a| a.path().is_ident("method")) else {
        return Ok(None);
    };
    let attr = func.attrs.remove(pos);
    attr.parse_args::<MethodAttrs>().map(Some)
}

/// Generate the registry entry for one annotated function
fn method_entry(
    self_ty: &Type,
    module_name: &str,
    func: &ImplItemFn,
    attrs: MethodAttrs,
) -> syn::Result<TokenStream2> {
    let sig = &func.sig;
    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            &sig.fn_token,
            "callable methods must be synchronous",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "callable methods cannot be generic",
        ));
    }

    let fn_name = &sig.ident;
    let method_name = fn_name.to_string();
    let display_name = attrs.name;

    let mut param_defs = Vec::new();
    let mut bindings = Vec::new();
    let mut call_args = Vec::new();

    for input in sig.inputs.iter() {
        let pat_type = match input {
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "callable methods must not take self",
                ));
            }
            FnArg::Typed(pat_type) => pat_type,
        };
        let ident = match &*pat_type.pat {
            Pat::Ident(ident) => &ident.ident,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "callable method parameters must be plain identifiers",
                ));
            }
        };
        let ty = &*pat_type.ty;
        if let Type::Reference(_) = ty {
            return Err(syn::Error::new_spanned(
                ty,
                "callable method parameters must be owned types",
            ));
        }

        let param_name = ident.to_string().trim_start_matches('_').to_string();
        param_defs.push(quote! {
            ::statecraft_runtime::ParamDef {
                name: #param_name.to_string(),
                kind: <#ty as ::statecraft_runtime::statecraft_types::Typed>::kind(),
            }
        });
        bindings.push(quote! {
            let #ident: #ty = ::statecraft_runtime::take_argument(&mut args, #param_name)?;
        });
        call_args.push(quote! { #ident });
    }

    let (returns, call) = match return_type(&sig.output) {
        None => (
            quote! { ::std::option::Option::None },
            quote! {
                <#self_ty>::#fn_name(#(#call_args),*);
                ::std::result::Result::Ok(::statecraft_runtime::statecraft_types::Value::Null)
            },
        ),
        Some(ret_ty) => (
            quote! {
                ::std::option::Option::Some(
                    <#ret_ty as ::statecraft_runtime::statecraft_types::Typed>::kind()
                )
            },
            quote! {
                let result = <#self_ty>::#fn_name(#(#call_args),*);
                ::std::result::Result::Ok(
                    ::statecraft_runtime::statecraft_types::Typed::into_value(result)
                )
            },
        ),
    };

    let description = match extract_doc_comment(&func.attrs) {
        Some(doc) => quote! { ::std::option::Option::Some(#doc.to_string()) },
        None => quote! { ::std::option::Option::None },
    };

    Ok(quote! {
        ::statecraft_runtime::MethodDef {
            module: #module_name.to_string(),
            method: #method_name.to_string(),
            display_name: #display_name.to_string(),
            description: #description,
            returns: #returns,
            parameters: ::std::vec![#(#param_defs),*],
            invoker: ::std::sync::Arc::new(::statecraft_runtime::FnMethodInvoker::new(
                |values: &[::statecraft_runtime::statecraft_types::Value]|
                 -> ::std::result::Result<
                    ::statecraft_runtime::statecraft_types::Value,
                    ::statecraft_runtime::MethodError,
                > {
                    #[allow(unused_mut, unused_variables)]
                    let mut args = values.iter().cloned();
                    #(#bindings)*
                    #call
                },
            )),
        }
    })
}

fn expand_module(attrs: ModuleAttrs, mut item: ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[module] must be placed on an inherent impl block",
        ));
    }

    let self_ty = item.self_ty.clone();
    let module_name = attrs
        .name
        .unwrap_or_else(|| derive_module_name(&self_ty));

    let mut entries = Vec::new();
    for impl_item in item.items.iter_mut() {
        if let ImplItem::Fn(func) = impl_item {
            if let Some(method_attrs) = take_method_attr(func)? {
                entries.push(method_entry(&self_ty, &module_name, func, method_attrs)?);
            }
        }
    }

    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    Ok(quote! {
        #item

        impl #impl_generics ::statecraft_runtime::Module for #self_ty #where_clause {
            fn module_name() -> &'static str {
                #module_name
            }

            fn methods() -> ::std::vec::Vec<::statecraft_runtime::MethodDef> {
                ::std::vec![#(#entries),*]
            }
        }
    })
}

/// Attribute macro declaring a module of callable methods.
///
/// # Attributes
///
/// - `name` (optional): Module name used in method identities (defaults to
///   the impl's type name)
///
/// Inside the impl block, mark each callable associated function with
/// `#[method(name = "Display/name")]` (or the shorthand
/// `#[method("Display/name")]`). Callable functions take no receiver and use
/// owned parameter types implementing `Typed`. A unit return makes the
/// method an action; any other return makes it a condition/filter.
///
/// # Example
///
/// ```ignore
/// pub struct PlayerModule;
///
/// #[module]
/// impl PlayerModule {
///     /// Whether the player has health left.
///     #[method(name = "Player/is alive")]
///     pub fn is_alive(health: f32) -> bool {
///         health > 0.0
///     }
/// }
/// ```
///
/// This generates an `impl statecraft_runtime::Module for PlayerModule`
/// returning one `MethodDef` per marked function.
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = parse_macro_input!(attr as ModuleAttrs);
    let item = parse_macro_input!(item as ItemImpl);

    match expand_module(attrs, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
