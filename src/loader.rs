//! Import resolution: a flat model where every imported module's
//! top-level statements are spliced directly into the user program.
//! There is no module namespacing, and `math` is always implicitly
//! imported.

use std::collections::HashSet;
use std::error::Error;
use std::fmt::{self, Display};
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::ast::{Program, Statement};
use crate::lexer;
use crate::parser;

const IMPLICIT_MODULES: &[&str] = &["math"];

#[derive(Debug)]
pub struct LoadError {
    pub module: String,
    pub path: PathBuf,
    pub source: String,
}

impl Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not load module '{}' from '{}': {}",
            self.module,
            self.path.display(),
            self.source
        )
    }
}

impl Error for LoadError {}

fn module_path(std_dir: &Path, module: &str) -> PathBuf {
    std_dir.join(format!("{module}.0x"))
}

fn import_names(program: &Program) -> Vec<String> {
    program
        .iter()
        .filter_map(|statement| match statement {
            Statement::Import { module, .. } => Some(module.clone()),
            _ => None,
        })
        .collect()
}

fn load_module(std_dir: &Path, module: &str) -> Result<Program, Box<dyn Error>> {
    let path = module_path(std_dir, module);
    debug!("loading module '{module}' from '{}'", path.display());

    let source = fs::read_to_string(&path).map_err(|e| LoadError {
        module: module.to_owned(),
        path: path.clone(),
        source: e.to_string(),
    })?;

    let tokens = lexer::lex(&source)?;
    let program = parser::parse(tokens, source.as_str())?;
    Ok(program)
}

/// Resolves every `import` in `program` (plus the unconditional
/// `math` import) against `std_dir` and prepends the resolved
/// modules' top-level statements, in source order, ahead of the
/// user program.
pub fn resolve(program: Program, std_dir: &Path) -> Result<Program, Box<dyn Error>> {
    let mut names: Vec<String> = IMPLICIT_MODULES.iter().map(|s| s.to_string()).collect();
    names.extend(import_names(&program));

    let mut seen = HashSet::new();
    let mut prelude = Vec::new();

    for name in names {
        if !seen.insert(name.clone()) {
            continue;
        }
        let module_program = load_module(std_dir, &name)?;
        prelude.extend(module_program);
    }

    prelude.extend(program);
    Ok(prelude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_math_unconditionally() {
        let dir = tempdir();
        fs::write(dir.join("math.0x"), "class Math { abs(n: int): int { return n; } }").unwrap();

        let program: Program = vec![];
        let resolved = resolve(program, &dir).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(matches!(
            &resolved[0],
            Statement::ClassDeclaration { name, .. } if name == "Math"
        ));
    }

    #[test]
    fn deduplicates_repeated_imports() {
        let dir = tempdir();
        fs::write(dir.join("math.0x"), "class Math {}").unwrap();
        fs::write(dir.join("geo.0x"), "class Geo {}").unwrap();

        let src = "import math; import geo; import geo;";
        let tokens = lexer::lex(src).unwrap();
        let program = parser::parse(tokens, src).unwrap();
        let resolved = resolve(program, &dir).unwrap();

        // math (implicit) + geo (deduplicated), no user statements besides imports.
        let class_count = resolved
            .iter()
            .filter(|s| matches!(s, Statement::ClassDeclaration { .. }))
            .count();
        assert_eq!(class_count, 2);
    }

    #[test]
    fn missing_module_is_a_load_error() {
        let dir = tempdir();
        let program: Program = vec![];
        assert!(resolve(program, &dir).is_err());
    }

    fn tempdir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "oxc-loader-test-{}-{}",
            std::process::id(),
            unique_suffix()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn unique_suffix() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::SeqCst)
    }
}
