use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Ident, LitStr, Type};

/// Registers a marker type as a domain extension.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Domain)]
/// #[domain(
///     name = "model_exchange",
///     types(ModelExchange),
///     inputs = FmiInputs,
///     outputs = FmiOutputs,
///     inputs_schema = "../../contracts/domains/fmi/inputs.v1.json",
///     outputs_schema = "../../contracts/domains/fmi/outputs.v1.json",
/// )]
/// pub struct Fmi;
/// ```
///
/// Schema paths are relative to the deriving crate's manifest directory and
/// are embedded at compile time. Add `inputs_optional` when an envelope may
/// omit `inputs` entirely.
#[proc_macro_derive(Domain, attributes(domain))]
pub fn derive_domain(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct DomainAttrs {
    name: Option<LitStr>,
    types: Vec<Ident>,
    inputs: Option<Type>,
    outputs: Option<Type>,
    inputs_schema: Option<LitStr>,
    outputs_schema: Option<LitStr>,
    inputs_optional: bool,
}

fn parse_attrs(input: &DeriveInput) -> syn::Result<DomainAttrs> {
    let mut attrs = DomainAttrs::default();

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("domain")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                attrs.name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("types") {
                meta.parse_nested_meta(|variant| {
                    let ident = variant
                        .path
                        .get_ident()
                        .cloned()
                        .ok_or_else(|| variant.error("expected a ValidatorType variant"))?;
                    attrs.types.push(ident);
                    Ok(())
                })?;
            } else if meta.path.is_ident("inputs") {
                attrs.inputs = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("outputs") {
                attrs.outputs = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("inputs_schema") {
                attrs.inputs_schema = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("outputs_schema") {
                attrs.outputs_schema = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("inputs_optional") {
                attrs.inputs_optional = true;
            } else {
                return Err(meta.error("unsupported domain attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "domain markers cannot be generic",
        ));
    }

    let attrs = parse_attrs(input)?;
    let ident = &input.ident;
    let missing = |what: &str| {
        syn::Error::new_spanned(ident, format!("missing `{what}` in #[domain(...)]"))
    };

    let inputs = attrs.inputs.ok_or_else(|| missing("inputs"))?;
    let outputs = attrs.outputs.ok_or_else(|| missing("outputs"))?;
    let inputs_schema = attrs.inputs_schema.ok_or_else(|| missing("inputs_schema"))?;
    let outputs_schema = attrs.outputs_schema.ok_or_else(|| missing("outputs_schema"))?;
    if attrs.types.is_empty() {
        return Err(missing("types"));
    }

    let name = attrs
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string().to_lowercase(), Span::call_site()));
    let types = &attrs.types;
    let inputs_required = !attrs.inputs_optional;

    Ok(quote! {
        impl ::job_envelope::Domain for #ident {
            type Inputs = #inputs;
            type Outputs = #outputs;

            const NAME: &'static str = #name;

            fn validator_types() -> &'static [::job_envelope::ValidatorType] {
                &[#(::job_envelope::ValidatorType::#types),*]
            }

            fn inputs_schema() -> &'static str {
                include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/", #inputs_schema))
            }

            fn outputs_schema() -> &'static str {
                include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/", #outputs_schema))
            }

            fn inputs_required() -> bool {
                #inputs_required
            }
        }
    })
}
