use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, Lit, PathArguments, Type};

#[proc_macro_derive(WorkflowDefinition, attributes(workflow, field))]
pub fn derive_workflow_definition(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    // Extract workflow metadata from #[workflow(...)]
    let workflow_meta = extract_workflow_meta(&input.attrs);

    // Extract field schemas from struct fields
    let field_schemas: Vec<proc_macro2::TokenStream> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => {
                fields.named.iter().filter_map(|f| {
                    let name = f.ident.as_ref().unwrap().to_string();
                    let meta = extract_field_meta(&f.attrs);

                    if meta.skip {
                        return None;
                    }

                    let label = meta.label;
                    let description = meta.description;
                    let inferred = infer_field_type(&f.ty);
                    let final_field_type = meta.field_type.unwrap_or(inferred);
                    let cli_arg = format!("--{}", name.replace('_', "-"));
                    let required = !is_option_type(&f.ty) && meta.default.is_none();
                    let default = meta
                        .default
                        .map(|d| quote! { Some(#d.to_string()) })
                        .unwrap_or(quote! { None });

                    Some(quote! {
                        prodflow_sdk::FieldSchema {
                            name: #name.to_string(),
                            field_type: #final_field_type,
                            label: #label.to_string(),
                            description: #description.to_string(),
                            cli_arg: #cli_arg.to_string(),
                            required: #required,
                            default: #default,
                        }
                    })
                }).collect()
            }
            _ => panic!("WorkflowDefinition only supports named fields")
        },
        _ => panic!("WorkflowDefinition only supports structs")
    };

    let struct_name = &input.ident;
    let workflow_id = &workflow_meta.id;
    let workflow_name = &workflow_meta.name;
    let workflow_desc = &workflow_meta.description;

    let expanded = quote! {
        impl prodflow_sdk::WorkflowDefinition for #struct_name {
            fn metadata() -> prodflow_sdk::WorkflowMetadata {
                prodflow_sdk::WorkflowMetadata {
                    id: #workflow_id.to_string(),
                    name: #workflow_name.to_string(),
                    description: #workflow_desc.to_string(),
                }
            }

            fn fields() -> Vec<prodflow_sdk::FieldSchema> {
                vec![#(#field_schemas),*]
            }

            fn print_metadata(&self) {
                let full_metadata = prodflow_sdk::FullWorkflowMetadata {
                    metadata: <Self as prodflow_sdk::WorkflowDefinition>::metadata(),
                    fields: <Self as prodflow_sdk::WorkflowDefinition>::fields(),
                };
                if let Ok(json) = ::serde_json::to_string_pretty(&full_metadata) {
                    println!("{}", json);
                }
            }
        }
    };

    TokenStream::from(expanded)
}

struct WorkflowMeta {
    id: String,
    name: String,
    description: String,
}

fn lit_str(lit: Lit) -> Option<String> {
    if let Lit::Str(s) = lit {
        Some(s.value())
    } else {
        None
    }
}

fn extract_workflow_meta(attrs: &[Attribute]) -> WorkflowMeta {
    for attr in attrs {
        if attr.path().is_ident("workflow") {
            let mut id = String::new();
            let mut name = String::new();
            let mut description = String::new();

            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        id = s;
                    }
                } else if meta.path.is_ident("name") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        name = s;
                    }
                } else if meta.path.is_ident("description") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        description = s;
                    }
                }
                Ok(())
            });

            return WorkflowMeta { id, name, description };
        }
    }

    panic!("Missing #[workflow(...)] attribute");
}

struct FieldMeta {
    label: String,
    description: String,
    field_type: Option<proc_macro2::TokenStream>,
    default: Option<String>,
    skip: bool,
}

fn extract_field_meta(attrs: &[Attribute]) -> FieldMeta {
    let mut label = String::new();
    let mut description = String::new();
    let mut field_type = None;
    let mut min = None;
    let mut max = None;
    let mut pattern = None;
    let mut options = None;
    let mut default = None;
    let mut skip = false;

    for attr in attrs {
        if attr.path().is_ident("field") {
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                } else if meta.path.is_ident("label") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        label = s;
                    }
                } else if meta.path.is_ident("description") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        description = s;
                    }
                } else if meta.path.is_ident("type") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        field_type = Some(s);
                    }
                } else if meta.path.is_ident("min") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        min = s.parse::<i64>().ok();
                    }
                } else if meta.path.is_ident("max") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        max = s.parse::<i64>().ok();
                    }
                } else if meta.path.is_ident("pattern") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        pattern = Some(s);
                    }
                } else if meta.path.is_ident("options") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        options = Some(s);
                    }
                } else if meta.path.is_ident("default") {
                    let value = meta.value()?;
                    if let Some(s) = lit_str(value.parse()?) {
                        default = Some(s);
                    }
                }
                Ok(())
            });
        }
    }

    // Build field type token from parsed values
    let field_type_token = field_type.map(|ft| {
        match ft.as_str() {
            "text" => quote! { prodflow_sdk::FieldType::Text },
            "number" => {
                let min_token = min.map(|m| quote! { Some(#m) }).unwrap_or(quote! { None });
                let max_token = max.map(|m| quote! { Some(#m) }).unwrap_or(quote! { None });
                quote! { prodflow_sdk::FieldType::Number { min: #min_token, max: #max_token } }
            }
            "file_path" => {
                let pattern_token = pattern
                    .map(|p| quote! { Some(#p.to_string()) })
                    .unwrap_or(quote! { None });
                quote! { prodflow_sdk::FieldType::FilePath { pattern: #pattern_token } }
            }
            "select" => {
                let opts: Vec<String> = options
                    .unwrap_or_default()
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                quote! { prodflow_sdk::FieldType::Select { options: vec![#(#opts.to_string()),*] } }
            }
            _ => quote! { prodflow_sdk::FieldType::Text },
        }
    });

    FieldMeta {
        label,
        description,
        field_type: field_type_token,
        default,
        skip,
    }
}

fn infer_field_type(ty: &Type) -> proc_macro2::TokenStream {
    // Unwrap Option<T> first
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner_ty)) = args.args.first() {
                        return infer_field_type_inner(inner_ty);
                    }
                }
            } else {
                return infer_field_type_inner(ty);
            }
        }
    }

    quote! { prodflow_sdk::FieldType::Text }
}

fn infer_field_type_inner(ty: &Type) -> proc_macro2::TokenStream {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            let type_name = segment.ident.to_string();
            match type_name.as_str() {
                "String" => quote! { prodflow_sdk::FieldType::Text },
                "PathBuf" => quote! { prodflow_sdk::FieldType::FilePath { pattern: None } },
                "usize" | "u32" | "u64" | "i32" | "i64" | "f64" => {
                    quote! { prodflow_sdk::FieldType::Number { min: None, max: None } }
                }
                _ => quote! { prodflow_sdk::FieldType::Text },
            }
        } else {
            quote! { prodflow_sdk::FieldType::Text }
        }
    } else {
        quote! { prodflow_sdk::FieldType::Text }
    }
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}
