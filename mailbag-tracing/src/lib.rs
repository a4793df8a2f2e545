//! The `#[traced]` attribute used throughout the mailbag crates.
//!
//! ```ignore
//! #[traced(instrument(level = tracing::Level::TRACE, skip_all), timing(precision = "us"))]
//! async fn handle(&mut self) { /* ... */ }
//! ```
//!
//! `instrument(...)` is forwarded verbatim to `tracing::instrument`. `timing`
//! makes the exit event carry the time spent in the function, in nanoseconds
//! unless a `precision` of `"us"`, `"ms"` or `"s"` is given.
#![warn(clippy::pedantic)]

extern crate proc_macro;

use proc_macro2::TokenStream;
use quote::quote;
use syn::{ItemFn, LitStr, Stmt, meta::ParseNestedMeta, parse_macro_input, parse_quote};

#[derive(Debug, Clone, Copy, Default)]
enum Unit {
    #[default]
    Nanos,
    Micros,
    Millis,
    Secs,
}

impl Unit {
    fn named(name: &str) -> Option<Self> {
        match name {
            "ns" | "nanos" | "nanoseconds" => Some(Self::Nanos),
            "us" | "micros" | "microseconds" => Some(Self::Micros),
            "ms" | "millis" | "milliseconds" => Some(Self::Millis),
            "s" | "secs" | "seconds" => Some(Self::Secs),
            _ => None,
        }
    }

    /// The `Duration` accessor for this unit and the suffix it is printed with
    fn reading(self) -> (TokenStream, &'static str) {
        match self {
            Self::Nanos => (quote!(as_nanos), "ns"),
            Self::Micros => (quote!(as_micros), "us"),
            Self::Millis => (quote!(as_millis), "ms"),
            Self::Secs => (quote!(as_secs), "s"),
        }
    }
}

#[derive(Default)]
struct Options {
    instrument: Option<TokenStream>,
    timing: Option<Unit>,
}

impl Options {
    fn parse(&mut self, meta: &ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("instrument") {
            if self.instrument.is_some() {
                return Err(meta.error("`instrument` given more than once"));
            }

            self.instrument = Some(if meta.input.peek(syn::token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                content.parse()?
            } else {
                TokenStream::new()
            });

            Ok(())
        } else if meta.path.is_ident("timing") {
            if self.timing.is_some() {
                return Err(meta.error("`timing` given more than once"));
            }

            let mut unit = Unit::default();
            if meta.input.peek(syn::token::Paren) {
                meta.parse_nested_meta(|inner| {
                    if !inner.path.is_ident("precision") {
                        return Err(inner.error("expected `precision = \"...\"`"));
                    }

                    let name: LitStr = inner.value()?.parse()?;
                    unit = Unit::named(&name.value()).ok_or_else(|| {
                        syn::Error::new(name.span(), "precision must be one of \"ns\", \"us\", \"ms\" or \"s\"")
                    })?;

                    Ok(())
                })?;
            }

            self.timing = Some(unit);
            Ok(())
        } else {
            Err(meta.error("expected `instrument` or `timing`"))
        }
    }
}

/// Emits `tracing::trace!` events when the attributed function is entered and
/// when it returns, optionally inside a `tracing::instrument` span.
#[proc_macro_attribute]
pub fn traced(
    args: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let mut options = Options::default();
    let parser = syn::meta::parser(|meta| options.parse(&meta));
    parse_macro_input!(args with parser);

    let mut function = parse_macro_input!(item as ItemFn);
    let name = function.sig.ident.to_string();

    function
        .attrs
        .push(parse_quote!(#[allow(clippy::items_after_statements)]));
    if let Some(fields) = options.instrument {
        function
            .attrs
            .push(parse_quote!(#[tracing::instrument(#fields)]));
    }

    let on_exit = options.timing.map_or_else(
        || quote!(tracing::trace!("OnExit: {}", #name);),
        |unit| {
            let (accessor, suffix) = unit.reading();
            quote!(tracing::trace!("OnExit: {} ({} {} elapsed)", #name, self.0.elapsed().#accessor(), #suffix);)
        },
    );

    let prologue: Vec<Stmt> = parse_quote! {
        #[allow(dead_code)]
        struct __TracedGuard(std::time::Instant);

        impl std::ops::Drop for __TracedGuard {
            fn drop(&mut self) {
                #on_exit
            }
        }

        tracing::trace!("OnEnter: {}", #name);
        let __traced_guard = __TracedGuard(std::time::Instant::now());
    };

    function.block.stmts.splice(0..0, prologue);

    proc_macro::TokenStream::from(quote!(#function))
}
