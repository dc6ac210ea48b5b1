use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{DeriveInput, Ident, parse_macro_input};

/// Implement an interned label trait (`SystemSet`, `ScheduleLabel`) for the annotated type.
///
/// The type must also derive `Clone`, `PartialEq`, `Eq`, `Hash` and `Debug`; the trait's
/// `DynEq`/`DynHash` supertraits are covered by blanket impls in the schedule module.
pub fn derive_label(input: TokenStream, trait_name: &str) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let trait_ident = Ident::new(trait_name, Span::call_site());

    TokenStream::from(quote! {
        impl #impl_generics ::rusty_schedule::ecs::schedule::#trait_ident for #name #ty_generics #where_clause {
            fn dyn_clone(&self) -> ::std::boxed::Box<dyn ::rusty_schedule::ecs::schedule::#trait_ident> {
                ::std::boxed::Box::new(::core::clone::Clone::clone(self))
            }
        }
    })
}
