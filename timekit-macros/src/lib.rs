//! Procedural macros for timekit
//!
//! This crate provides the `#[timekit::test]` attribute macro for writing
//! async tests under an installed fake clock.
//!
//! # Example
//!
//! ```rust,ignore
//! use timekit::prelude::*;
//! use std::time::Duration;
//!
//! #[timekit::test]
//! async fn my_test(timers: FakeTimers) {
//!     let timer = timers.delay(Duration::from_secs(60));
//!     timers.set_time(timers.now_millis() + 2 * MINUTE).await.unwrap();
//!     assert!(timer.is_elapsed());
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, FnArg, Ident, ItemFn, Lit, Pat, Token, Type,
};

/// Configuration options for the test macro.
#[derive(Debug, Default)]
struct TestConfig {
    /// Initial simulated timestamp, milliseconds since the Unix epoch
    start_at: Option<i64>,
    /// Advancement increment for `set_time`, in milliseconds
    increment: Option<i64>,
}

impl Parse for TestConfig {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut config = TestConfig::default();

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let lit: Lit = input.parse()?;

            match ident.to_string().as_str() {
                "start_at" => {
                    let Lit::Int(int) = lit else {
                        return Err(syn::Error::new(
                            ident.span(),
                            "start_at expects an integer millisecond timestamp",
                        ));
                    };
                    config.start_at = Some(int.base10_parse()?);
                }
                "increment" => {
                    let Lit::Int(int) = lit else {
                        return Err(syn::Error::new(
                            ident.span(),
                            "increment expects an integer millisecond value",
                        ));
                    };
                    let value: i64 = int.base10_parse()?;
                    if value < 1 {
                        return Err(syn::Error::new(
                            int.span(),
                            format!("increment must be at least 1 ms, got {value}"),
                        ));
                    }
                    config.increment = Some(value);
                }
                _ => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {ident}"),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(config)
    }
}

/// Determines if a function parameter is requesting the FakeTimers guard.
fn is_timers_param(arg: &FnArg) -> bool {
    if let FnArg::Typed(pat_type) = arg {
        if let Type::Path(type_path) = &*pat_type.ty {
            if let Some(segment) = type_path.path.segments.last() {
                return segment.ident == "FakeTimers";
            }
        }
    }
    false
}

/// Extracts the parameter identifier from a function argument.
fn get_param_ident(arg: &FnArg) -> Option<&Ident> {
    if let FnArg::Typed(pat_type) = arg {
        if let Pat::Ident(pat_ident) = &*pat_type.pat {
            return Some(&pat_ident.ident);
        }
    }
    None
}

/// Test attribute macro for async tests under fake time.
///
/// The macro wraps the test in a current-thread tokio runtime and installs
/// fake timers for the test's duration, so the ambient `timekit::now_millis`
/// and `timekit::delay` functions report the controllable clock. The guard
/// is dropped (and real time restored) when the test ends, pass or fail.
///
/// # Basic Usage
///
/// ```rust,ignore
/// #[timekit::test]
/// async fn test_under_fake_time() {
///     // now_millis() reports the fake clock here
///     assert!(timekit::now_millis() > 0);
/// }
/// ```
///
/// # With FakeTimers Injection
///
/// Add a `timers: FakeTimers` parameter to receive the control handle:
///
/// ```rust,ignore
/// use timekit::prelude::*;
/// use std::time::Duration;
///
/// #[timekit::test]
/// async fn test_with_timers(timers: FakeTimers) {
///     let timer = timers.delay(Duration::from_secs(60));
///     timers.set_time(timers.now_millis() + 2 * MINUTE).await.unwrap();
///     assert!(timer.is_elapsed());
/// }
/// ```
///
/// # Configuration Options
///
/// - `start_at = <ms>` - Initial simulated timestamp (milliseconds since the
///   Unix epoch; default: the real current time)
/// - `increment = <ms>` - Advancement increment for `set_time` (default: one
///   minute)
///
/// ```rust,ignore
/// #[timekit::test(start_at = 950_536_800_000)]
/// async fn test_at_reference_time(timers: FakeTimers) {
///     assert!(timers.now_millis() >= 950_536_800_000);
/// }
///
/// #[timekit::test(increment = 1000)]
/// async fn test_fine_grained(timers: FakeTimers) {
///     // set_time steps the timer queue at most one second at a time
/// }
/// ```
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = parse_macro_input!(attr as TestConfig);
    let input = parse_macro_input!(item as ItemFn);

    expand_test(config, input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_test(config: TestConfig, input: ItemFn) -> syn::Result<TokenStream2> {
    let name = &input.sig.ident;
    let output = &input.sig.output;
    let body = &input.block;
    let attrs = &input.attrs;
    let vis = &input.vis;

    // Check if function is async
    if input.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &input.sig,
            "test function must be async",
        ));
    }

    // The only supported parameter is the FakeTimers guard
    if input.sig.inputs.len() > 1 {
        return Err(syn::Error::new_spanned(
            &input.sig.inputs,
            "test function takes at most one parameter, the FakeTimers guard",
        ));
    }
    let timers_ident = if let Some(arg) = input.sig.inputs.first() {
        if !is_timers_param(arg) {
            return Err(syn::Error::new_spanned(
                arg,
                "unsupported parameter; only `timers: FakeTimers` injection is supported",
            ));
        }
        let Some(ident) = get_param_ident(arg) else {
            return Err(syn::Error::new_spanned(
                arg,
                "the FakeTimers parameter must be a plain identifier",
            ));
        };
        ident.clone()
    } else {
        Ident::new("_timekit_guard", proc_macro2::Span::call_site())
    };

    // Generate the guard installation
    let install = match config.start_at {
        Some(start_at) => quote! {
            let #timers_ident = ::timekit::clock::FakeTimers::starting_at(#start_at);
        },
        None => quote! {
            let #timers_ident = ::timekit::clock::setup_fake_timers();
        },
    };

    // Already validated to be >= 1 at parse time
    let configure = config
        .increment
        .map(|increment| {
            quote! {
                #timers_ident
                    .set_default_increment(#increment)
                    .expect("increment was validated when the attribute was parsed");
            }
        })
        .unwrap_or_default();

    Ok(quote! {
        #[::tokio::test]
        #(#attrs)*
        #vis async fn #name() #output {
            #install
            #configure
            #body
        }
    })
}

#[cfg(test)]
mod tests {
    use super::TestConfig;

    #[::core::prelude::v1::test]
    fn test_config_parse_empty() {
        let config: TestConfig = syn::parse_str("").unwrap();
        assert!(config.start_at.is_none());
        assert!(config.increment.is_none());
    }

    #[::core::prelude::v1::test]
    fn test_config_parse_start_at() {
        let config: TestConfig = syn::parse_str("start_at = 950536800000").unwrap();
        assert_eq!(config.start_at, Some(950_536_800_000));
    }

    #[::core::prelude::v1::test]
    fn test_config_parse_multiple() {
        let config: TestConfig = syn::parse_str("start_at = 1000, increment = 250").unwrap();
        assert_eq!(config.start_at, Some(1000));
        assert_eq!(config.increment, Some(250));
    }

    #[::core::prelude::v1::test]
    fn test_config_rejects_zero_increment() {
        let err = syn::parse_str::<TestConfig>("increment = 0").unwrap_err();
        assert!(err.to_string().contains("at least 1 ms"));
    }

    #[::core::prelude::v1::test]
    fn test_config_rejects_unknown_key() {
        let err = syn::parse_str::<TestConfig>("flavor = \"multi_thread\"").unwrap_err();
        assert!(err.to_string().contains("unknown attribute"));
    }
}
