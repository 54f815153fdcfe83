//! Procedural macros for the Fibra runtime.
//!
//! - `#[fibra::main]` turns an `async fn main` into a synchronous entry
//!   point that builds a runtime and blocks on the body.
//! - `#[fibra::test]` does the same for `#[test]` functions.
//!
//! Both accept `worker_threads = N`.

mod utils;

use proc_macro::{TokenStream, TokenTree};

#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = match utils::parse_options(attr) {
        Ok(options) => options,
        Err(msg) => return utils::compile_error(&msg),
    };

    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let Some(pos) = utils::body_position(&tokens) else {
        return utils::compile_error("#[fibra::main] expects a function body");
    };

    utils::wrap_body(&mut tokens, pos, &options);
    utils::strip_async(&mut tokens);

    tokens.into_iter().collect()
}

#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = match utils::parse_options(attr) {
        Ok(options) => options,
        Err(msg) => return utils::compile_error(&msg),
    };

    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let Some(pos) = utils::body_position(&tokens) else {
        return utils::compile_error("#[fibra::test] expects a function body");
    };

    utils::wrap_body(&mut tokens, pos, &options);
    utils::strip_async(&mut tokens);

    let mut result: Vec<TokenTree> = match "#[test]".parse::<TokenStream>() {
        Ok(attr) => attr.into_iter().collect(),
        Err(_) => Vec::new(),
    };
    result.extend(tokens);

    result.into_iter().collect()
}
