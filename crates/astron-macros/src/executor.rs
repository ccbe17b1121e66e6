use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Ident, ItemFn, LitStr};

/// Which registry the function is contributed to.
#[derive(Clone, Copy)]
pub enum Kind {
    Command,
    Listener,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Self::Command => "COMMAND",
            Self::Listener => "LISTENER",
        }
    }
}

/// Leaves the decorated `async fn` unchanged and appends a
/// `#[::astron_core::linkme::distributed_slice]` static that makes it
/// available to `ExecutorCatalog::collect_all` under `id`.
///
/// Without an argument the function name is the id.
pub fn expand(kind: Kind, attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let func: ItemFn = syn::parse2(item)?;
    let fn_name = &func.sig.ident;

    if func.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            func.sig.fn_token,
            "executors must be `async fn`",
        ));
    }

    let id = if attr.is_empty() {
        LitStr::new(&fn_name.to_string(), fn_name.span())
    } else {
        syn::parse2::<LitStr>(attr)?
    };
    let value = id.value();
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(syn::Error::new(
            id.span(),
            "executor id must be non-empty and contain no whitespace",
        ));
    }

    let static_name = Ident::new(
        &format!(
            "_ASTRON_{}_{}",
            kind.label(),
            fn_name.to_string().to_uppercase()
        ),
        Span::call_site(),
    );

    let (slice, entry, adapter) = match kind {
        Kind::Command => (
            quote!(::astron_core::COMMAND_EXECUTORS),
            quote!(::astron_core::CommandExecutorEntry),
            quote!(::astron_core::command_fn),
        ),
        Kind::Listener => (
            quote!(::astron_core::LISTENER_EXECUTORS),
            quote!(::astron_core::ListenerExecutorEntry),
            quote!(::astron_core::listener_fn),
        ),
    };

    Ok(quote! {
        #func

        #[::astron_core::linkme::distributed_slice(#slice)]
        #[linkme(crate = ::astron_core::linkme)]
        static #static_name: #entry = #entry {
            id: #id,
            factory: || #adapter(#fn_name),
        };
    })
}
