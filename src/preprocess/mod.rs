//! `$INCLUDE` preprocessing
//!
//! Sputnik-derived tests pull helper libraries in with a directive such as
//! `$INCLUDE("Date_library.js");`. The front-end knows nothing about these,
//! so the harness splices each library into the test before translation and
//! writes the result next to the test with a `.pp` extension.

pub mod dst;

use crate::case::{TestCase, INCLUDE_DIRECTIVE};
use crate::error::{Error, Result};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::debug;

/// Extension of preprocessed test sources
pub const PREPROCESSED_EXTENSION: &str = "pp";

/// Library that receives the host DST declarations
pub const DATE_LIBRARY: &str = "Date_library.js";

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$INCLUDE\s*\(\s*['"](\w*\.\w*)['"]\s*\)"#).unwrap()
});

/// Name included by `line`, if it is an `$INCLUDE` directive
pub fn include_name(line: &str) -> Option<&str> {
    if !line.trim().starts_with(INCLUDE_DIRECTIVE) {
        return None;
    }
    DIRECTIVE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Source of the timezone declarations injected into the date library
pub trait TimezoneFacts: Send + Sync {
    fn declarations(&self) -> String;
}

/// Facts read from the host's local clock at the time of the call
#[derive(Debug, Clone, Copy, Default)]
pub struct HostTimezone;

impl TimezoneFacts for HostTimezone {
    fn declarations(&self) -> String {
        dst::host_declarations()
    }
}

/// Fixed declarations, for tests and reproducible runs
#[derive(Debug, Clone, Default)]
pub struct FixedTimezone(pub String);

impl TimezoneFacts for FixedTimezone {
    fn declarations(&self) -> String {
        self.0.clone()
    }
}

/// Expands `$INCLUDE` directives against two include directories
pub struct Preprocessor {
    user_dir: PathBuf,
    system_dir: PathBuf,
    timezone: Box<dyn TimezoneFacts>,
}

impl Preprocessor {
    /// Preprocessor using the host's DST facts
    pub fn new(user_dir: impl Into<PathBuf>, system_dir: impl Into<PathBuf>) -> Self {
        Self::with_timezone(user_dir, system_dir, Box::new(HostTimezone))
    }

    pub fn with_timezone(
        user_dir: impl Into<PathBuf>,
        system_dir: impl Into<PathBuf>,
        timezone: Box<dyn TimezoneFacts>,
    ) -> Self {
        Self {
            user_dir: user_dir.into(),
            system_dir: system_dir.into(),
            timezone,
        }
    }

    /// Locate an include, preferring the user directory
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        [&self.user_dir, &self.system_dir]
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| Error::IncludeNotFound {
                name: name.to_string(),
            })
    }

    /// Library text for `name`, with DST facts prepended for the date library
    fn include(&self, name: &str) -> Result<String> {
        let mut text = if name == DATE_LIBRARY {
            self.timezone.declarations()
        } else {
            String::new()
        };

        let path = self.resolve(name)?;
        debug!(include = name, path = %path.display(), "resolved include");
        let body = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        text.push_str(&body);
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }

    /// Harness files prepended to every preprocessed test; currently none
    fn system_includes(&self) -> String {
        String::new()
    }

    /// Expand every directive in `source`
    pub fn expand(&self, source: &str) -> Result<String> {
        let mut out = self.system_includes();
        out.push('\n');

        for line in source.split_inclusive('\n') {
            match include_name(line) {
                Some(name) => {
                    out.push_str(&format!("// >>>> {}\n", name));
                    out.push_str(&self.include(name)?);
                    out.push_str(&format!("// <<<< {}\n", name));
                }
                None => out.push_str(line),
            }
        }

        Ok(out)
    }

    /// Expand `source` of `case` and write it to the `.pp` sibling
    pub fn write_sibling(&self, case: &TestCase, source: &str) -> Result<PathBuf> {
        let expanded = self.expand(source)?;
        let target = case.artifact(PREPROCESSED_EXTENSION);
        std::fs::write(&target, expanded).map_err(|e| Error::io(&target, e))?;
        debug!(test = %case.name(), target = %target.display(), "wrote preprocessed source");
        Ok(target)
    }
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor")
            .field("user_dir", &self.user_dir)
            .field("system_dir", &self.system_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Dirs {
        _root: tempfile::TempDir,
        user: PathBuf,
        system: PathBuf,
    }

    fn dirs() -> Dirs {
        let root = tempfile::tempdir().unwrap();
        let user = root.path().join("lib");
        let system = root.path().join("harness");
        fs::create_dir(&user).unwrap();
        fs::create_dir(&system).unwrap();
        Dirs {
            _root: root,
            user,
            system,
        }
    }

    fn preprocessor(d: &Dirs, tz: &str) -> Preprocessor {
        Preprocessor::with_timezone(&d.user, &d.system, Box::new(FixedTimezone(tz.to_string())))
    }

    #[test]
    fn test_include_name_matching() {
        assert_eq!(include_name("$INCLUDE(\"Date_library.js\");\n"), Some("Date_library.js"));
        assert_eq!(include_name("  $INCLUDE ( 'math_isequal.js' )"), Some("math_isequal.js"));
        assert_eq!(include_name("var a = '$INCLUDE(\"x.js\")';"), None);
        assert_eq!(include_name("$INCLUDE(noquotes.js)"), None);
    }

    #[test]
    fn test_source_without_directive_is_only_wrapped() {
        let d = dirs();
        let source = "var x = 1;\r\nvar y = 2;";
        assert_eq!(preprocessor(&d, "").expand(source).unwrap(), format!("\n{}", source));
    }

    #[test]
    fn test_user_dir_wins_over_system_dir() {
        let d = dirs();
        fs::write(d.user.join("a.js"), "user();\n").unwrap();
        fs::write(d.system.join("a.js"), "system();\n").unwrap();
        fs::write(d.system.join("b.js"), "fallback();").unwrap();

        let out = preprocessor(&d, "")
            .expand("$INCLUDE(\"a.js\");\n$INCLUDE('b.js');\nrun();\n")
            .unwrap();
        assert_eq!(
            out,
            "\n// >>>> a.js\nuser();\n// <<<< a.js\n\
             // >>>> b.js\nfallback();\n// <<<< b.js\nrun();\n"
        );
    }

    #[test]
    fn test_missing_include_is_an_error() {
        let d = dirs();
        let err = preprocessor(&d, "").expand("$INCLUDE(\"nope.js\");\n").unwrap_err();
        assert!(matches!(err, Error::IncludeNotFound { ref name } if name == "nope.js"));
    }

    #[test]
    fn test_date_library_gets_timezone_facts() {
        let d = dirs();
        fs::write(d.user.join(DATE_LIBRARY), "function LocalTZA() {}\n").unwrap();
        fs::write(d.user.join("other.js"), "other();\n").unwrap();

        let pp = preprocessor(&d, "var $LocalTZ = -5;\n");
        let out = pp
            .expand("$INCLUDE(\"Date_library.js\");\n$INCLUDE(\"other.js\");\n")
            .unwrap();
        assert_eq!(
            out,
            "\n// >>>> Date_library.js\nvar $LocalTZ = -5;\nfunction LocalTZA() {}\n\
             // <<<< Date_library.js\n// >>>> other.js\nother();\n// <<<< other.js\n"
        );
    }

    #[test]
    fn test_repeated_expansion_is_stable() {
        let d = dirs();
        fs::write(d.user.join(DATE_LIBRARY), "lib();\n").unwrap();
        let pp = preprocessor(&d, "var $DST_end_hour = 2;\n");
        let source = "$INCLUDE(\"Date_library.js\");\ncheck();\n";
        assert_eq!(pp.expand(source).unwrap(), pp.expand(source).unwrap());
    }

    #[test]
    fn test_write_sibling_overwrites() {
        let d = dirs();
        fs::write(d.user.join("a.js"), "a();\n").unwrap();
        let test_path = d.user.parent().unwrap().join("S15.9_A1.js");
        let case = TestCase::new(&test_path, d.user.parent().unwrap());
        let pp = preprocessor(&d, "");

        fs::write(case.artifact(PREPROCESSED_EXTENSION), "stale").unwrap();
        let target = pp.write_sibling(&case, "$INCLUDE(\"a.js\");\n").unwrap();
        assert_eq!(target, case.artifact(PREPROCESSED_EXTENSION));
        assert_eq!(
            fs::read_to_string(target).unwrap(),
            "\n// >>>> a.js\na();\n// <<<< a.js\n"
        );
    }
}
