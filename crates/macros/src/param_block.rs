//! ParamBlock derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::parse::{parse_param_block, ParamBlockArgs, ParamFieldArgs};

/// Generate the ParamBlock implementation
pub fn derive_param_block(input: DeriveInput) -> TokenStream {
    match parse_param_block(&input) {
        Ok(args) => generate_impl(args),
        Err(e) => e.write_errors(),
    }
}

fn generate_impl(args: ParamBlockArgs) -> TokenStream {
    let struct_name = &args.ident;
    let function = &args.function;
    let size = args.size;

    let fields = match args.data {
        darling::ast::Data::Struct(fields) => fields.fields,
        _ => {
            return syn::Error::new_spanned(
                &args.ident,
                "ParamBlock can only be derived for structs",
            )
            .to_compile_error()
        }
    };

    let writes: Vec<_> = fields.iter().map(generate_write).collect();
    let reads: Vec<_> = fields
        .iter()
        .filter(|f| f.out)
        .map(generate_read)
        .collect();

    let property_names: Vec<_> = fields.iter().map(|f| f.property_name()).collect();

    quote! {
        impl ::coopbridge_core::invoke::ParamBlock for #struct_name {
            const FUNCTION: &'static str = #function;
            const SIZE: usize = #size;
            const PROPERTIES: &'static [&'static str] = &[#(#property_names),*];

            fn encode(
                &self,
                descriptor: &::coopbridge_core::invoke::FunctionDescriptor,
            ) -> ::std::result::Result<
                ::coopbridge_core::invoke::ParameterBlock,
                ::coopbridge_core::invoke::InvokeError,
            > {
                descriptor.expect_size(Self::SIZE)?;
                let mut block = ::coopbridge_core::invoke::ParameterBlock::for_descriptor(descriptor);
                #(#writes)*
                Ok(block)
            }

            #[allow(unused_variables)]
            fn decode_outputs(
                &mut self,
                descriptor: &::coopbridge_core::invoke::FunctionDescriptor,
                block: &::coopbridge_core::invoke::ParameterBlock,
            ) -> ::std::result::Result<(), ::coopbridge_core::invoke::InvokeError> {
                #(#reads)*
                Ok(())
            }
        }
    }
}

fn generate_write(field: &ParamFieldArgs) -> TokenStream {
    let Some(ident) = field.ident.as_ref() else {
        return quote! {};
    };
    let property = field.property_name();

    quote! {
        {
            let slot = descriptor.slot(#property)?;
            block.write_slot(slot, self.#ident)?;
        }
    }
}

fn generate_read(field: &ParamFieldArgs) -> TokenStream {
    let Some(ident) = field.ident.as_ref() else {
        return quote! {};
    };
    let field_ty = &field.ty;
    let property = field.property_name();

    quote! {
        {
            let slot = descriptor.slot(#property)?;
            self.#ident = block.read_slot::<#field_ty>(slot)?;
        }
    }
}
