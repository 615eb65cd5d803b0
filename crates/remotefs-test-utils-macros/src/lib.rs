// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `#[logged_test]`: wraps a test in a [`remotefs_test_utils::TestLoggerGuard`]
//! and binds `logger` for the body.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, ItemFn, ReturnType, Type};

/// Attribute macro for synchronous tests.
///
/// ```rust,ignore
/// #[remotefs_test_utils::logged_test]
/// fn lookup_known_name() {
///     logger.log("running").unwrap();
/// }
/// ```
#[proc_macro_attribute]
pub fn logged_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            Span::call_site(),
            "#[logged_test] does not accept arguments",
        )
        .to_compile_error()
        .into();
    }

    let mut input = parse_macro_input!(item as ItemFn);

    if let Some(async_token) = &input.sig.asyncness {
        return syn::Error::new(
            async_token.span(),
            "#[logged_test] cannot be applied to async functions",
        )
        .to_compile_error()
        .into();
    }
    if !input.sig.inputs.is_empty() {
        return syn::Error::new(
            input.sig.ident.span(),
            "#[logged_test] can only be applied to functions without parameters",
        )
        .to_compile_error()
        .into();
    }

    input.attrs.retain(|attr| !attr.path().is_ident("logged_test"));

    let fn_ident = &input.sig.ident;
    let fn_name = fn_ident.to_string();
    let visibility = &input.vis;
    let generics = &input.sig.generics;
    let output = &input.sig.output;
    let block = &input.block;
    let other_attrs = &input.attrs;
    let finish = finish_tokens(output);

    let expanded = quote! {
        #[::core::prelude::v1::test]
        #(#other_attrs)*
        #visibility fn #fn_ident #generics () #output {
            let mut __guard = ::remotefs_test_utils::TestLoggerGuard::new(#fn_name)
                .expect("failed to create test logger");
            let mut logger = __guard.logger();
            let _ = &mut logger;

            let inner_result = { #block };
            drop(logger);
            #finish
        }
    };
    expanded.into()
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(path) => path
                .path
                .segments
                .last()
                .map(|segment| segment.ident == "Result")
                .unwrap_or(false),
            _ => false,
        },
        ReturnType::Default => false,
    }
}

fn finish_tokens(output: &ReturnType) -> TokenStream2 {
    if returns_result(output) {
        quote! {
            match inner_result {
                ::std::result::Result::Ok(value) => {
                    if let Err(e) = __guard.finish_success() {
                        panic!("failed to finalize test log: {}", e);
                    }
                    ::std::result::Result::Ok(value)
                }
                ::std::result::Result::Err(err) => {
                    if let Err(e) = __guard.finish_failure(format!("{}", err)) {
                        eprintln!("failed to finalize test log after error: {}", e);
                    }
                    ::std::result::Result::Err(err)
                }
            }
        }
    } else {
        quote! {
            if let Err(e) = __guard.finish_success() {
                panic!("failed to finalize test log: {}", e);
            }
            inner_result
        }
    }
}
