//! Function anchor resolution.
//!
//! A Substrait plan refers to functions through integer anchors declared in
//! its extension section. The registry is populated once per plan and is
//! immutable afterwards. Declared names are full signature specs such as
//! `gte:i64_i64`; [`split_signature`] separates the bare name from the
//! argument type tags.

use crate::error::ConvertError;
use std::collections::HashMap;
use substrait::proto;
use substrait::proto::extensions::simple_extension_declaration::MappingType;

/// Anchor -> function name spec, built from a plan's extension declarations.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<u32, String>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every `extension_function` declaration of the plan.
    pub fn from_plan(plan: &proto::Plan) -> Self {
        let mut functions = HashMap::new();
        for extension in &plan.extensions {
            if let Some(MappingType::ExtensionFunction(function)) = &extension.mapping_type {
                functions.insert(function.function_anchor, function.name.clone());
            }
        }
        FunctionRegistry { functions }
    }

    /// The full declared name spec for an anchor, e.g. `gte:i64_i64`.
    pub fn name_spec(&self, anchor: u32) -> Result<&str, ConvertError> {
        self.functions
            .get(&anchor)
            .map(String::as_str)
            .ok_or(ConvertError::UnknownFunction(anchor))
    }

    /// The bare function name for an anchor, with the signature stripped.
    pub fn base_name(&self, anchor: u32) -> Result<&str, ConvertError> {
        Ok(split_signature(self.name_spec(anchor)?).0)
    }

    /// The argument type tags declared for an anchor.
    pub fn signature_types(&self, anchor: u32) -> Result<Vec<&str>, ConvertError> {
        Ok(split_signature(self.name_spec(anchor)?).1)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Split a declared name spec into the bare name and its argument type tags:
/// `gte:i32_i32` -> (`gte`, [`i32`, `i32`]).
pub fn split_signature(spec: &str) -> (&str, Vec<&str>) {
    match spec.split_once(':') {
        Some((name, signature)) => (
            name,
            signature.split('_').filter(|tag| !tag.is_empty()).collect(),
        ),
        None => (spec, Vec::new()),
    }
}
