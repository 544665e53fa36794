use crate::ast::{Import, Program};
use crate::builtins::FMT_PATH;
use crate::error::{Error, ResolutionError, Result};
use crate::lexer::Lexer;
use crate::parser::Parser;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub program: Program,
}

impl SourceFile {
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// Files sharing one `package` clause, keyed by import path.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub path: String,
    pub files: Vec<SourceFile>,
}

impl Package {
    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.files.iter().flat_map(|file| file.program.imports.iter())
    }
}

/// Parses a source text into a program.
pub fn parse_source(source: &str) -> Result<Program> {
    let tokens = Lexer::new(source).tokenize()?;
    Ok(Parser::new(tokens).parse()?)
}

#[derive(Debug, Default)]
pub struct ModuleSystem {
    src_root: Option<PathBuf>,
    packages: HashMap<String, Package>,
}

impl ModuleSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packages missing from memory are read from `<src_root>/<import path>/`.
    pub fn with_src_root(src_root: impl Into<PathBuf>) -> Self {
        Self {
            src_root: Some(src_root.into()),
            packages: HashMap::new(),
        }
    }

    /// Adds one file to the package at `import_path`, creating the package if needed.
    pub fn add_source(
        &mut self,
        import_path: &str,
        file_path: impl Into<PathBuf>,
        source: &str,
    ) -> Result<()> {
        let file_path = file_path.into();
        let program =
            parse_source(source).map_err(|e| e.in_file(file_path.display().to_string()))?;

        match self.packages.get_mut(import_path) {
            Some(package) => {
                if package.name != program.package {
                    return Err(ResolutionError::PackageMismatch {
                        expected: package.name.clone(),
                        found: program.package,
                        directory: import_path.to_string(),
                    }
                    .into());
                }
                package.files.push(SourceFile {
                    path: file_path,
                    program,
                });
            }
            None => {
                self.packages.insert(
                    import_path.to_string(),
                    Package {
                        name: program.package.clone(),
                        path: import_path.to_string(),
                        files: vec![SourceFile {
                            path: file_path,
                            program,
                        }],
                    },
                );
            }
        }
        Ok(())
    }

    pub fn load_file(&mut self, import_path: &str, file: &Path) -> Result<()> {
        let source =
            fs::read_to_string(file).map_err(|e| Error::from(e).in_file(file.display().to_string()))?;
        self.add_source(import_path, file, &source)
    }

    /// Loads every `.go` file of `directory`, in file-name order.
    pub fn load_directory(&mut self, import_path: &str, directory: &Path) -> Result<()> {
        let mut files = Vec::new();
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "go") {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(ResolutionError::PackageNotFound {
                path: import_path.to_string(),
                searched: directory.display().to_string(),
            }
            .into());
        }

        debug!(package = import_path, files = files.len(), "loading package");
        for file in files {
            self.load_file(import_path, &file)?;
        }
        Ok(())
    }

    /// Loads everything `entry` imports and returns the packages dependencies-first.
    pub fn resolve(&mut self, entry: &str) -> Result<Vec<&Package>> {
        let mut order = Vec::new();
        let mut visiting = Vec::new();
        self.visit(entry, &mut visiting, &mut order)?;

        Ok(order
            .iter()
            .filter_map(|path| self.packages.get(path))
            .collect())
    }

    fn visit(
        &mut self,
        import_path: &str,
        visiting: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if order.iter().any(|done| done == import_path) {
            return Ok(());
        }
        if let Some(start) = visiting.iter().position(|p| p == import_path) {
            let mut cycle = visiting[start..].to_vec();
            cycle.push(import_path.to_string());
            return Err(ResolutionError::ImportCycle {
                path: cycle.join(" -> "),
            }
            .into());
        }

        if !self.packages.contains_key(import_path) {
            self.load_from_root(import_path)?;
        }

        let imports: Vec<String> = match self.packages.get(import_path) {
            Some(package) => package
                .imports()
                .map(|import| import.path.clone())
                .filter(|path| path != FMT_PATH)
                .collect(),
            None => Vec::new(),
        };

        visiting.push(import_path.to_string());
        for import in imports {
            self.visit(&import, visiting, order)?;
        }
        visiting.pop();

        order.push(import_path.to_string());
        Ok(())
    }

    fn load_from_root(&mut self, import_path: &str) -> Result<()> {
        match self.src_root.clone() {
            Some(root) => {
                let directory = root.join(import_path);
                if !directory.is_dir() {
                    return Err(ResolutionError::PackageNotFound {
                        path: import_path.to_string(),
                        searched: directory.display().to_string(),
                    }
                    .into());
                }
                self.load_directory(import_path, &directory)
            }
            None => Err(ResolutionError::PackageNotFound {
                path: import_path.to_string(),
                searched: "memory".to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_orders_dependencies_first() {
        let mut modules = ModuleSystem::new();
        modules
            .add_source("main", "main.go", "package main\nimport \"a\"\nimport \"fmt\"\n")
            .unwrap();
        modules
            .add_source("a", "a.go", "package a\nimport \"b\"\n")
            .unwrap();
        modules.add_source("b", "b.go", "package b\n").unwrap();

        let order: Vec<_> = modules
            .resolve("main")
            .unwrap()
            .iter()
            .map(|p| p.path.clone())
            .collect();
        assert_eq!(order, vec!["b", "a", "main"]);
    }

    #[test]
    fn test_import_cycle_is_reported() {
        let mut modules = ModuleSystem::new();
        modules
            .add_source("a", "a.go", "package a\nimport \"b\"\n")
            .unwrap();
        modules
            .add_source("b", "b.go", "package b\nimport \"a\"\n")
            .unwrap();

        let err = modules.resolve("a").unwrap_err();
        assert_eq!(
            err.to_string(),
            "resolution error: import cycle not allowed: a -> b -> a"
        );
    }

    #[test]
    fn test_package_clause_must_agree() {
        let mut modules = ModuleSystem::new();
        modules.add_source("lib", "one.go", "package lib\n").unwrap();
        let err = modules
            .add_source("lib", "two.go", "package other\n")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Resolution(ResolutionError::PackageMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_package_without_root() {
        let mut modules = ModuleSystem::new();
        modules
            .add_source("main", "main.go", "package main\nimport \"nowhere\"\n")
            .unwrap();
        assert!(matches!(
            modules.resolve("main"),
            Err(Error::Resolution(ResolutionError::PackageNotFound { .. }))
        ));
    }

    #[test]
    fn test_syntax_error_names_file() {
        let mut modules = ModuleSystem::new();
        let err = modules
            .add_source("main", "broken.go", "package main\nfunc {\n")
            .unwrap_err();
        assert!(err.to_string().starts_with("broken.go: syntax error: 2:6"));
    }

    #[test]
    fn test_loads_packages_from_src_root() {
        let root = tempfile::tempdir().unwrap();
        let lib = root.path().join("util");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("b.go"), "package util\nfunc B() int { return 2 }\n").unwrap();
        fs::write(lib.join("a.go"), "package util\nfunc A() int { return 1 }\n").unwrap();
        fs::write(lib.join("notes.txt"), "not go").unwrap();

        let mut modules = ModuleSystem::with_src_root(root.path());
        modules
            .add_source("main", "main.go", "package main\nimport \"util\"\n")
            .unwrap();
        let packages = modules.resolve("main").unwrap();

        assert_eq!(packages[0].name, "util");
        let files: Vec<_> = packages[0]
            .files
            .iter()
            .filter_map(|f| f.path.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();
        assert_eq!(files, vec!["a.go", "b.go"]);
    }
}
