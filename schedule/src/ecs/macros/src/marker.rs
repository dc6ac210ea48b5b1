use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{DeriveInput, Ident, parse_macro_input};

/// Implement an empty marker trait (`Component`, `Resource`) for the annotated type.
pub fn derive_marker(input: TokenStream, trait_name: &str) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let trait_ident = Ident::new(trait_name, Span::call_site());

    // `::rusty_schedule` resolves inside the crate through `extern crate self as rusty_schedule;`.
    TokenStream::from(quote! {
        impl #impl_generics ::rusty_schedule::ecs::component::#trait_ident for #name #ty_generics #where_clause {
        }
    })
}
