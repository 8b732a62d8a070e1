//! Resolution of syntactic type expressions to canonical LLIR types.
use std::collections::HashMap;

use crate::ast::{FieldDecl, TypeExpr, TypeSpec};
use crate::llir::{Module, StructDef, StructField, StructRef, Type};

use super::error::{CgResult, CodegenError, ErrorKind};

/// Registry of named types. Struct definitions are interned: every reference
/// resolves to the same [StructRef], so a recursive declaration works by
/// installing an empty placeholder under its name before the body is
/// resolved and filling the fields in place afterwards.
#[derive(Debug)]
pub struct TypeManager {
    named: HashMap<String, Type>,
    defs: Vec<StructRef>,
    anon_count: usize,
}

impl TypeManager {
    pub fn new() -> Self {
        Self {
            named: HashMap::new(),
            defs: vec![],
            anon_count: 0,
        }
    }

    /// The closed table of primitive type names.
    fn primitive(name: &str) -> Option<Type> {
        Some(match name {
            "bool" => Type::BOOL,
            "int8" => Type::Int(8),
            "int16" => Type::Int(16),
            "int32" => Type::Int(32),
            "int64" => Type::Int(64),
            "uint8" => Type::Uint(8),
            "uint16" => Type::Uint(16),
            "uint32" => Type::Uint(32),
            "uint64" => Type::Uint(64),
            "int" => Type::Int(32),
            "uint" => Type::Uint(32),
            "float32" => Type::F32,
            "float64" => Type::F64,
            _ => return None,
        })
    }

    /// Whether `name` denotes a type (used to flag type-conversion calls).
    pub fn is_type_name(&self, name: &str) -> bool {
        Self::primitive(name).is_some() || self.named.contains_key(name)
    }

    pub fn parse_type(&mut self, expr: &TypeExpr) -> CgResult<Type> {
        match expr {
            TypeExpr::Name(name) => {
                if let Some(primitive) = Self::primitive(&name.name) {
                    return Ok(primitive);
                }
                self.named.get(&name.name).cloned().ok_or_else(|| {
                    CodegenError::new(
                        ErrorKind::UnknownType,
                        format!("unknown type {}", name.name),
                        name.position,
                    )
                })
            }
            TypeExpr::Pointer(pointer) => Ok(self.parse_type(&pointer.pointee)?.ptr()),
            TypeExpr::Array(array) => {
                if array.length < 0 {
                    return Err(CodegenError::new(
                        ErrorKind::UnknownType,
                        "negative array length not allowed",
                        array.position,
                    ));
                }
                let element = self.parse_type(&array.element)?;
                Ok(Type::Array(array.length as u64, Box::new(element)))
            }
            TypeExpr::Struct(body) => {
                // an inline struct literal becomes a freshly named type
                let def = StructDef::placeholder(format!("anon.{}", self.anon_count));
                self.anon_count += 1;
                let fields = self.parse_fields(&body.fields)?;
                *def.fields.borrow_mut() = fields;
                self.defs.push(def.clone());
                Ok(Type::Struct(def))
            }
        }
    }

    fn parse_fields(&mut self, decls: &[FieldDecl]) -> CgResult<Vec<StructField>> {
        let mut fields = vec![];
        for decl in decls {
            let ty = self.parse_type(&decl.ty)?;
            for name in &decl.names {
                if fields.iter().any(|field: &StructField| &field.name == name) {
                    return Err(CodegenError::new(
                        ErrorKind::DuplicateSymbol,
                        format!("duplicate field {name}"),
                        decl.position,
                    ));
                }
                fields.push(StructField {
                    name: name.clone(),
                    ty: ty.clone(),
                });
            }
        }
        Ok(fields)
    }

    pub fn parse_type_decl(&mut self, spec: &TypeSpec) -> CgResult<()> {
        if self.is_type_name(&spec.name) {
            return Err(CodegenError::new(
                ErrorKind::DuplicateType,
                format!("type {} redefined", spec.name),
                spec.position,
            ));
        }

        if !spec.alias {
            if let TypeExpr::Struct(body) = &spec.ty {
                // install the placeholder first so pointer-to-self fields
                // resolve to the definition being built
                let def = StructDef::placeholder(&spec.name);
                self.named
                    .insert(spec.name.clone(), Type::Struct(def.clone()));
                self.defs.push(def.clone());

                let fields = match self.parse_fields(&body.fields) {
                    Ok(fields) => fields,
                    Err(err) => {
                        self.named.remove(&spec.name);
                        self.defs.pop();
                        return Err(err);
                    }
                };
                *def.fields.borrow_mut() = fields;
                return Ok(());
            }
        }

        // aliases and non-struct definitions bind the resolved type directly
        let ty = self.parse_type(&spec.ty)?;
        self.named.insert(spec.name.clone(), ty);
        Ok(())
    }

    /// Append all named (and anonymous) struct types to the module's
    /// type-def list.
    pub fn update_module(&self, module: &mut Module) {
        for def in &self.defs {
            module.typedefs.push(def.clone());
        }
    }
}

/// The common type two operands combine at. Exact equality only: implicit
/// numeric widening is deliberately not performed, so mixed widths surface as
/// a diagnostic at the call site.
pub fn common_supertype(a: &Type, b: &Type) -> Option<Type> {
    if a == b {
        Some(a.clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ArrayType, PointerType, StructType, TypeName};

    fn name(text: &str) -> TypeExpr {
        TypeExpr::Name(TypeName {
            name: text.into(),
            position: (1, 1),
        })
    }

    #[test]
    fn test_primitive_table() {
        let mut manager = TypeManager::new();
        assert_eq!(manager.parse_type(&name("bool")).unwrap(), Type::BOOL);
        assert_eq!(manager.parse_type(&name("int")).unwrap(), Type::Int(32));
        assert_eq!(manager.parse_type(&name("uint16")).unwrap(), Type::Uint(16));
        assert_eq!(manager.parse_type(&name("float64")).unwrap(), Type::F64);
        let err = manager.parse_type(&name("strange")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownType);
    }

    #[test]
    fn test_pointer_and_array() {
        let mut manager = TypeManager::new();
        let ty = manager
            .parse_type(&TypeExpr::Array(ArrayType {
                length: 5,
                element: Box::new(TypeExpr::Pointer(PointerType {
                    pointee: Box::new(name("int")),
                    position: (1, 1),
                })),
                position: (1, 1),
            }))
            .unwrap();
        assert_eq!(ty.to_string(), "[5 x i32*]");
    }

    #[test]
    fn test_recursive_struct_decl() {
        let mut manager = TypeManager::new();
        manager
            .parse_type_decl(&TypeSpec {
                name: "Node".into(),
                alias: false,
                ty: TypeExpr::Struct(StructType {
                    fields: vec![
                        FieldDecl {
                            names: vec!["Next".into()],
                            ty: TypeExpr::Pointer(PointerType {
                                pointee: Box::new(name("Node")),
                                position: (1, 1),
                            }),
                            position: (1, 1),
                        },
                        FieldDecl {
                            names: vec!["Value".into()],
                            ty: name("int"),
                            position: (1, 1),
                        },
                    ],
                    position: (1, 1),
                }),
                position: (1, 1),
            })
            .unwrap();

        let Type::Struct(def) = manager.parse_type(&name("Node")).unwrap() else {
            panic!("expected struct type");
        };
        // the Next field points back at the same definition
        let (ordinal, field_ty) = def.compute_offset("Next").unwrap();
        assert_eq!(ordinal, 0);
        assert_eq!(field_ty, Type::Struct(def.clone()).ptr());
    }

    #[test]
    fn test_type_redefinition() {
        let mut manager = TypeManager::new();
        let spec = TypeSpec {
            name: "T".into(),
            alias: true,
            ty: name("int"),
            position: (1, 1),
        };
        manager.parse_type_decl(&spec).unwrap();
        let err = manager.parse_type_decl(&spec).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateType);
    }

    #[test]
    fn test_common_supertype_is_equality() {
        assert_eq!(
            common_supertype(&Type::Int(32), &Type::Int(32)),
            Some(Type::Int(32))
        );
        assert_eq!(common_supertype(&Type::Int(32), &Type::Int(64)), None);
        assert_eq!(common_supertype(&Type::Int(32), &Type::Uint(32)), None);
    }
}
