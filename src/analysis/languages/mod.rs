//! Language-specific analyzer implementations and the analyzer registry.
//!
//! Each language module exposes an `install()` function that registers a
//! factory for one or more [`Language`]s. [`register_all`] calls them all
//! once; lookups go through [`create_analyzer`].

mod actionscript;
mod bash;
mod c;
mod go;
mod lua;
mod php;
mod python;
mod rust_lang;
mod salesforce;
pub mod terraform;
mod typescript;

pub use actionscript::ActionScriptAnalyzer;
pub use bash::BashAnalyzer;
pub use c::CAnalyzer;
pub use go::GoAnalyzer;
pub use lua::LuaAnalyzer;
pub use php::PhpAnalyzer;
pub use python::PythonAnalyzer;
pub use rust_lang::RustAnalyzer;
pub use salesforce::SalesforceAnalyzer;
pub use terraform::TerraformAnalyzer;
pub use typescript::TypeScriptAnalyzer;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use super::context::AnalyzerContext;
use super::LanguageAnalyzer;

/// Languages with a registered analyzer.
///
/// Declaration order is significant: it breaks ties during extension-count
/// detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Go,
    Php,
    TypeScript,
    JavaScript,
    Python,
    Apex,
    Lua,
    Rust,
    C,
    Cpp,
    Bash,
    ActionScript,
    Terraform,
}

impl Language {
    pub const ALL: &'static [Language] = &[
        Language::Go,
        Language::Php,
        Language::TypeScript,
        Language::JavaScript,
        Language::Python,
        Language::Apex,
        Language::Lua,
        Language::Rust,
        Language::C,
        Language::Cpp,
        Language::Bash,
        Language::ActionScript,
        Language::Terraform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Php => "php",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Apex => "apex",
            Language::Lua => "lua",
            Language::Rust => "rust",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Bash => "bash",
            Language::ActionScript => "actionscript",
            Language::Terraform => "terraform",
        }
    }

    /// Language of a file extension (without dot).
    pub fn from_extension(ext: &str) -> Option<Language> {
        EXTENSIONS.get(ext.to_ascii_lowercase().as_str()).copied()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "go" | "golang" => Language::Go,
            "php" => Language::Php,
            "typescript" | "ts" => Language::TypeScript,
            "javascript" | "js" | "node" => Language::JavaScript,
            "python" | "py" => Language::Python,
            "apex" | "salesforce" | "sfdx" => Language::Apex,
            "lua" => Language::Lua,
            "rust" | "rs" => Language::Rust,
            "c" => Language::C,
            "cpp" | "c++" | "cxx" => Language::Cpp,
            "bash" | "shell" | "sh" => Language::Bash,
            "actionscript" | "as3" | "flex" => Language::ActionScript,
            "terraform" | "hcl" | "tf" => Language::Terraform,
            other => anyhow::bail!("unknown language: {}", other),
        })
    }
}

/// File extension → language, used by detection.
static EXTENSIONS: phf::Map<&'static str, Language> = phf::phf_map! {
    "go" => Language::Go,
    "php" => Language::Php,
    "ts" => Language::TypeScript,
    "tsx" => Language::TypeScript,
    "js" => Language::JavaScript,
    "jsx" => Language::JavaScript,
    "mjs" => Language::JavaScript,
    "cjs" => Language::JavaScript,
    "py" => Language::Python,
    "cls" => Language::Apex,
    "trigger" => Language::Apex,
    "lua" => Language::Lua,
    "rs" => Language::Rust,
    "c" => Language::C,
    "h" => Language::C,
    "cc" => Language::Cpp,
    "cpp" => Language::Cpp,
    "cxx" => Language::Cpp,
    "hpp" => Language::Cpp,
    "hh" => Language::Cpp,
    "sh" => Language::Bash,
    "bash" => Language::Bash,
    "as" => Language::ActionScript,
    "mxml" => Language::ActionScript,
    "tf" => Language::Terraform,
};

/// Builds an analyzer bound to one repository.
pub type AnalyzerFactory = fn(AnalyzerContext) -> Box<dyn LanguageAnalyzer>;

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<Language, AnalyzerFactory>> = RwLock::new(HashMap::new());
}

/// Whether analyzers have been registered.
static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Install a factory for a language, replacing any previous one.
pub fn register(language: Language, factory: AnalyzerFactory) {
    let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    registry.insert(language, factory);
}

/// Register all available language analyzers.
///
/// This is idempotent - calling it multiple times is safe.
pub fn register_all() {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return;
    }

    actionscript::install();
    bash::install();
    c::install();
    go::install();
    lua::install();
    php::install();
    python::install();
    rust_lang::install();
    salesforce::install();
    terraform::install();
    typescript::install();
}

/// Build the analyzer registered for `language`.
pub fn create_analyzer(language: Language, ctx: AnalyzerContext) -> Option<Box<dyn LanguageAnalyzer>> {
    register_all();
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    registry.get(&language).map(|factory| factory(ctx))
}

/// Languages with a registered factory, in declaration order.
pub fn registered_languages() -> Vec<Language> {
    register_all();
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    let mut languages: Vec<Language> = registry.keys().copied().collect();
    languages.sort();
    languages
}
