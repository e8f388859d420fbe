//! Language detection and tree-sitter grammar lookup.
//!
//! Trimmed from the teacher's eight-language `Language` enum down to the
//! four the core supports; `from_extension`/`ts_language` keep the same
//! shape as `rpg_parser::languages`.

use codegraph_core::Language;

pub fn from_extension(ext: &str) -> Option<Language> {
    Language::from_extension(ext)
}

/// Extracts the extension (without the dot) from a file path.
pub fn extension_of(path: &str) -> Option<&str> {
    path.rsplit('.').next().filter(|ext| *ext != path)
}

pub fn detect(path: &str) -> Option<Language> {
    extension_of(path).and_then(from_extension)
}

pub fn ts_language(language: Language) -> tree_sitter::Language {
    match language {
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Javascript => tree_sitter_javascript::LANGUAGE.into(),
        Language::Typescript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
    }
}

/// tsx uses a distinct grammar from plain .ts; callers that need to
/// special-case it check the extension directly rather than branching the
/// `Language` enum, since tsx and ts share one `Language::Typescript` value.
pub fn is_tsx(path: &str) -> bool {
    extension_of(path) == Some("tsx")
}

pub fn ts_language_for_path(path: &str, language: Language) -> tree_sitter::Language {
    if language == Language::Typescript && is_tsx(path) {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    } else {
        ts_language(language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_the_four_supported_languages() {
        assert_eq!(detect("m.py"), Some(Language::Python));
        assert_eq!(detect("m.js"), Some(Language::Javascript));
        assert_eq!(detect("m.jsx"), Some(Language::Javascript));
        assert_eq!(detect("m.ts"), Some(Language::Typescript));
        assert_eq!(detect("m.tsx"), Some(Language::Typescript));
        assert_eq!(detect("M.java"), Some(Language::Java));
        assert_eq!(detect("m.rb"), None);
    }
}
