//! The package symbol table, filled by the declaration-collection pass.
use std::collections::HashMap;

use crate::ast::{Declaration, Signature, SourceFile, TopLevelDecl};
use crate::llir::Type;

use super::error::{CgResult, CodegenError, ErrorKind};
use super::types::TypeManager;

#[derive(Debug, Clone)]
pub struct TypedName {
    pub name: String,
    pub ty: Type,
}

/// The signature of a declared function or method. Free functions carry the
/// package-qualified name `<package>__<identifier>`; method names stay
/// unqualified and live under their receiver type.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub receiver: Option<TypedName>,
    pub args: Vec<TypedName>,
    pub rets: Vec<TypedName>,
}

#[derive(Debug)]
pub struct ImportAlias {
    pub path: String,
    pub alias: String,
}

#[derive(Debug)]
pub struct PackageTable {
    pub name: String,
    pub imports: Vec<ImportAlias>,
    pub types: TypeManager,
    pub functions: HashMap<String, FunctionDecl>,
    pub methods: HashMap<String, HashMap<String, FunctionDecl>>,
}

impl PackageTable {
    /// Single walk over the parse tree: package name, imports, type
    /// declarations and function/method signatures, in source order.
    pub fn collect(file: &SourceFile) -> CgResult<PackageTable> {
        let mut table = PackageTable {
            name: file.package.name.clone(),
            imports: vec![],
            types: TypeManager::new(),
            functions: HashMap::new(),
            methods: HashMap::new(),
        };

        for import in &file.imports {
            table.imports.push(ImportAlias {
                path: import.path.clone(),
                alias: import.alias.clone().unwrap_or_else(|| import.path.clone()),
            });
        }

        for decl in &file.decls {
            match decl {
                TopLevelDecl::Declaration(Declaration::Type(specs)) => {
                    for spec in specs {
                        table.types.parse_type_decl(spec)?;
                    }
                }
                TopLevelDecl::Declaration(_) => {
                    // global var/const initializers run in the codegen pass
                }
                TopLevelDecl::Function(def) => {
                    let qualified = format!("{}__{}", table.name, def.name);
                    if table.functions.contains_key(&qualified) {
                        return Err(CodegenError::new(
                            ErrorKind::DuplicateSymbol,
                            format!("function {} already declared", def.name),
                            def.position,
                        ));
                    }
                    let fundec =
                        table.parse_signature(&qualified, &def.name, &def.signature, None)?;
                    table.functions.insert(qualified, fundec);
                }
                TopLevelDecl::Method(def) => {
                    let receiver_ty = table.types.parse_type(&def.receiver.ty)?;
                    let receiver = TypedName {
                        name: def.receiver.name.clone(),
                        ty: receiver_ty,
                    };
                    let key = type_key(&receiver.ty);
                    let already_declared = table
                        .methods
                        .get(&key)
                        .is_some_and(|methods| methods.contains_key(&def.name));
                    if already_declared {
                        return Err(CodegenError::new(
                            ErrorKind::DuplicateSymbol,
                            format!("method {} already declared", def.name),
                            def.position,
                        ));
                    }
                    let fundec =
                        table.parse_signature(&def.name, &def.name, &def.signature, Some(receiver))?;
                    table
                        .methods
                        .entry(key)
                        .or_default()
                        .insert(def.name.clone(), fundec);
                }
            }
        }

        Ok(table)
    }

    fn parse_signature(
        &mut self,
        qualified: &str,
        ident: &str,
        signature: &Signature,
        receiver: Option<TypedName>,
    ) -> CgResult<FunctionDecl> {
        let mut args = vec![];
        for param in &signature.params {
            args.push(TypedName {
                name: param.name.clone(),
                ty: self.types.parse_type(&param.ty)?,
            });
        }

        let mut rets = vec![];
        for (i, result) in signature.results.iter().enumerate() {
            rets.push(TypedName {
                name: result.name.clone(),
                ty: self.types.parse_type(&result.ty)?,
            });
            // multi-return out-parameters need stable names for the return
            // sites to store through
            if result.name.is_empty() && signature.results.len() > 1 {
                rets[i].name = format!("{ident}__ret_{i}");
            }
        }

        Ok(FunctionDecl {
            name: qualified.to_string(),
            receiver,
            args,
            rets,
        })
    }

    pub fn qualify(&self, ident: &str) -> String {
        format!("{}__{ident}", self.name)
    }
}

/// Key a receiver type for the method table by its display form.
fn type_key(ty: &Type) -> String {
    ty.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::parse;

    fn collect(input: &str) -> CgResult<PackageTable> {
        PackageTable::collect(&parse(Lexer::new(input).lex().unwrap()).unwrap())
    }

    #[test]
    fn test_collect_functions() {
        let table = collect("package p\nfunc add(a, b int) int { return a + b }\nfunc main() {}")
            .unwrap();
        assert_eq!(table.name, "p");
        let add = table.functions.get("p__add").unwrap();
        assert_eq!(add.args.len(), 2);
        assert_eq!(add.rets.len(), 1);
        assert!(table.functions.contains_key("p__main"));
    }

    #[test]
    fn test_synthesized_return_names() {
        let table = collect("package p\nfunc divmod(a, b int) (int, int) { return a/b, a%b }")
            .unwrap();
        let decl = table.functions.get("p__divmod").unwrap();
        assert_eq!(decl.rets[0].name, "divmod__ret_0");
        assert_eq!(decl.rets[1].name, "divmod__ret_1");
    }

    #[test]
    fn test_named_returns_kept() {
        let table = collect("package p\nfunc f() (q int, ok bool) { return 1, true }").unwrap();
        let decl = table.functions.get("p__f").unwrap();
        assert_eq!(decl.rets[0].name, "q");
        assert_eq!(decl.rets[1].name, "ok");
    }

    #[test]
    fn test_duplicate_function() {
        let err = collect("package p\nfunc f() {}\nfunc f() {}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateSymbol);
    }

    #[test]
    fn test_method_collection() {
        let table = collect(
            "package p\ntype List struct { head int }\nfunc (l *List) len() int { return 0 }",
        )
        .unwrap();
        let methods = table.methods.get("%List*").unwrap();
        assert!(methods.contains_key("len"));
        // method names stay unqualified
        assert_eq!(methods.get("len").unwrap().name, "len");
    }

    #[test]
    fn test_import_alias_defaults_to_path() {
        let table = collect("package p\nimport \"fmt\"\nimport f \"fmt\"\nfunc main() {}").unwrap();
        assert_eq!(table.imports[0].alias, "fmt");
        assert_eq!(table.imports[1].alias, "f");
    }
}
