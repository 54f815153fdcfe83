use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Runtime options accepted by `#[fibra::main(...)]` and `#[fibra::test(...)]`.
#[derive(Default)]
pub(crate) struct EntryOptions {
    /// Number of executor worker threads, if overridden.
    pub(crate) worker_threads: Option<usize>,
}

/// Parses a comma-separated `key = value` attribute list.
///
/// Unknown keys are reported as an error message so the caller can turn
/// them into a `compile_error!`.
pub(crate) fn parse_options(attr: TokenStream) -> Result<EntryOptions, String> {
    let mut options = EntryOptions::default();
    let attr = attr.to_string();

    for part in attr.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .ok_or_else(|| format!("expected `key = value`, found `{part}`"))?;

        match key {
            "worker_threads" => {
                let n = value
                    .parse::<usize>()
                    .map_err(|_| format!("`worker_threads` expects an integer, found `{value}`"))?;
                options.worker_threads = Some(n);
            }
            other => return Err(format!("unknown runtime option `{other}`")),
        }
    }

    Ok(options)
}

/// Removes the `async` keyword from a function signature.
pub(crate) fn strip_async(tokens: &mut Vec<TokenTree>) {
    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }
}

/// Returns the position of the function body (the last brace group).
pub(crate) fn body_position(tokens: &[TokenTree]) -> Option<usize> {
    tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
}

/// Builds the `RuntimeBuilder` expression for the given options.
pub(crate) fn builder_expr(options: &EntryOptions) -> String {
    let mut builder = String::from("::fibra::RuntimeBuilder::new()");

    if let Some(n) = options.worker_threads {
        builder.push_str(&format!(".worker_threads({n})"));
    }

    builder.push_str(".build()");
    builder
}

/// Replaces the body at `pos` with a block that runs the original body
/// on a freshly built runtime.
pub(crate) fn wrap_body(tokens: &mut [TokenTree], pos: usize, options: &EntryOptions) {
    let body = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => return,
    };

    let wrapped = format!(
        "{{
            let runtime = {};
            runtime.block_on(async move {{ {} }})
        }}",
        builder_expr(options),
        body
    );

    let stream = wrapped.parse().unwrap_or_else(|_| TokenStream::new());
    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream));
}

/// Expands into a `compile_error!` carrying `msg`.
pub(crate) fn compile_error(msg: &str) -> TokenStream {
    format!("compile_error!({msg:?});")
        .parse()
        .unwrap_or_else(|_| TokenStream::new())
}
