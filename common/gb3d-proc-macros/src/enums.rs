use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{Data, DeriveInput, Fields, Variant};

fn unit_variants<'a>(
    input: &'a DeriveInput,
    derive_name: &str,
) -> Result<&'a Punctuated<Variant, Comma>, syn::Error> {
    let name = &input.ident;
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            format!("{derive_name} can only be applied to enums; {name} is not an enum"),
        ));
    };

    if let Some(variant) = data.variants.iter().find(|v| !matches!(v.fields, Fields::Unit)) {
        let variant_name = &variant.ident;
        let message = format!(
            "{derive_name} only supports fieldless variants; {name}::{variant_name} has fields"
        );
        return Err(syn::Error::new_spanned(variant, message));
    }

    Ok(&data.variants)
}

fn expand(
    input: TokenStream,
    derive_name: &str,
    f: impl FnOnce(&DeriveInput, &Punctuated<Variant, Comma>) -> TokenStream2,
) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match unit_variants(&input, derive_name) {
        Ok(variants) => f(&input, variants).into(),
        Err(err) => err.to_compile_error().into(),
    }
}

pub fn enum_display(input: TokenStream) -> TokenStream {
    expand(input, "EnumDisplay", |input, variants| {
        let name = &input.ident;
        let match_arms = variants.iter().map(|variant| {
            let variant_name = &variant.ident;
            let variant_name_str = variant_name.to_string();
            quote! { Self::#variant_name => #variant_name_str }
        });

        quote! {
            impl #name {
                #[must_use]
                pub fn to_str(&self) -> &'static str {
                    match self {
                        #(#match_arms,)*
                    }
                }
            }

            impl ::std::fmt::Display for #name {
                fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                    f.write_str(self.to_str())
                }
            }
        }
    })
}

pub fn enum_all(input: TokenStream) -> TokenStream {
    expand(input, "EnumAll", |input, variants| {
        let name = &input.ident;
        let constructors = variants.iter().map(|variant| {
            let variant_name = &variant.ident;
            quote! { Self::#variant_name }
        });
        let num_variants = variants.len();

        quote! {
            impl #name {
                pub const ALL: [Self; #num_variants] = [#(#constructors,)*];
            }
        }
    })
}
