use proc_macro::TokenStream;
use quote::quote;

fn get_enum_variants(
    input: &syn::DeriveInput,
) -> &syn::punctuated::Punctuated<syn::Variant, syn::token::Comma> {
    let variants = match &input.data {
        syn::Data::Enum(enum_item) => &enum_item.variants,
        _ => panic!("Input must be an enum."),
    };

    assert!(
        variants.iter().all(|v| v.fields.is_empty()),
        "All variants must have no fields."
    );

    variants
}

/// The string a variant parses from: the variant name, unless overridden
/// with `#[enum_str(rename = "...")]`. The override exists for names that
/// are not valid Rust identifiers, such as `AF'`.
fn variant_literal(variant: &syn::Variant) -> String {
    for attr in &variant.attrs {
        if !attr.path.is_ident("enum_str") {
            continue;
        }
        if let Ok(syn::Meta::List(list)) = attr.parse_meta() {
            for nested in list.nested {
                if let syn::NestedMeta::Meta(syn::Meta::NameValue(nv)) = nested {
                    if nv.path.is_ident("rename") {
                        if let syn::Lit::Str(s) = nv.lit {
                            return s.value();
                        }
                    }
                }
            }
        }
        panic!("Expected #[enum_str(rename = \"...\")].");
    }
    variant.ident.to_string()
}

#[proc_macro_derive(EnumFromStr, attributes(enum_str))]
pub fn enum_from_str_derive(input: TokenStream) -> TokenStream {
    let syn_item: syn::DeriveInput = syn::parse(input).unwrap();
    let name = &syn_item.ident;
    let name_str = name.to_string();
    let variants = get_enum_variants(&syn_item);
    let literals = variants.iter().map(variant_literal);
    let identifiers = variants.iter().map(|v| &v.ident);

    let expanded = quote! {
        impl EnumFromStr for #name {
            fn from_str(s: &str) -> Result<#name, ::util::ParseEnumError> {
                match s {
                    #( #literals => Ok(#name::#identifiers), )*
                    _ => Err(::util::ParseEnumError {
                        value: s.to_string(),
                        enum_name: #name_str,
                    }),
                }
            }
        }

        impl ::core::str::FromStr for #name {
            type Err = ::util::ParseEnumError;

            fn from_str(s: &str) -> Result<#name, ::util::ParseEnumError> {
                EnumFromStr::from_str(s)
            }
        }
    };

    expanded.into()
}
