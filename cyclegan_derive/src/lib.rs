extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;

/// Derive a `{Name}Config` struct holding every field tagged with `#[builder(...)]`, and a
/// `{Name}Builder` for it whose `build` hands the finished config to `{Name}::new`.
///
/// Fields without a `builder` attribute are runtime state and are left out of the config.
/// Every config field is expected to carry a default.
#[proc_macro_derive(PartialBuilder, attributes(builder))]
pub fn partial_builder_derive(input: TokenStream) -> TokenStream {
    let ast: syn::DeriveInput = match syn::parse(input) {
        Ok(ast) => ast,
        Err(err) => return err.to_compile_error().into(),
    };

    let builder_fields = match ast.data {
        syn::Data::Struct(syn::DataStruct {
            fields: syn::Fields::Named(syn::FieldsNamed { named, .. }),
            ..
        }) => named
            .into_iter()
            .filter(|field| field.attrs.iter().any(|attr| attr.path.is_ident("builder")))
            .collect::<Vec<_>>(),
        _ => {
            return syn::Error::new_spanned(
                &ast.ident,
                "PartialBuilder can only be used on structs with named fields",
            )
            .to_compile_error()
            .into()
        }
    };

    let name = &ast.ident;
    let vis = &ast.vis;
    let config_name = syn::Ident::new(&format!("{}Config", name), name.span());

    let builder_name = syn::Ident::new(&format!("{}Builder", name), name.span());
    let builder_name_str = syn::LitStr::new(&builder_name.to_string(), builder_name.span());
    let expect_msg = syn::LitStr::new(
        &format!("every field of {} has a default", config_name),
        name.span(),
    );
    let output = quote! {
        #[derive(derive_builder::Builder, Clone, Debug)]
        #[builder(pattern = "owned", name = #builder_name_str, build_fn(private, name = "build_config"))]
        #vis struct #config_name {
            #(#builder_fields),*
        }

        impl #builder_name {
            pub fn build(self) -> #name {
                #name::new(self.build_config().expect(#expect_msg))
            }
        }
    };
    output.into()
}
