//! Attribute parsing for ParamBlock derive macro

use darling::{FromDeriveInput, FromField};
use syn::{DeriveInput, Ident, Type};

/// Parsed #[param_block(...)] attributes on the struct
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(param_block), supports(struct_named))]
pub struct ParamBlockArgs {
    /// Struct identifier
    pub ident: Ident,

    /// Struct fields
    pub data: darling::ast::Data<(), ParamFieldArgs>,

    /// Host function name (e.g., "SetCurrentSeason")
    pub function: String,

    /// Expected parameter block size in bytes for the host build we target
    pub size: usize,
}

/// Parsed #[param(...)] attributes on a field
#[derive(Debug, FromField)]
#[darling(attributes(param))]
pub struct ParamFieldArgs {
    /// Field identifier
    pub ident: Option<Ident>,

    /// Field type
    pub ty: Type,

    /// Host property name (e.g., "NewSeason")
    /// Defaults to the field name in UpperCamelCase
    #[darling(default)]
    pub name: Option<String>,

    /// Whether the callee writes this field (read back after the call)
    #[darling(default)]
    pub out: bool,
}

impl ParamFieldArgs {
    /// Host property name for this field
    pub fn property_name(&self) -> String {
        match (&self.name, &self.ident) {
            (Some(name), _) => name.clone(),
            (None, Some(ident)) => upper_camel(&ident.to_string()),
            (None, None) => String::new(),
        }
    }
}

/// Convert `new_season` to `NewSeason`
pub fn upper_camel(snake: &str) -> String {
    snake
        .trim_start_matches('_')
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Parse a DeriveInput into ParamBlockArgs
pub fn parse_param_block(input: &DeriveInput) -> darling::Result<ParamBlockArgs> {
    ParamBlockArgs::from_derive_input(input)
}
