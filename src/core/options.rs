//! Typed command-line option model.
//!
//! A program's typed flags live in an [`OptionSet`]: an ordered list of
//! named [`OptionGroup`]s, each an ordered list of [`CommandLineOption`]s.
//! Rendering walks groups and options in declaration order; options placed
//! at the end are rendered in a separate, later pass. File-independent
//! settings shared by every vendor (defines, include and link directories,
//! libraries) live in [`NativeSettings`] and are rendered by the vendor
//! dialect.

use std::path::{Path, PathBuf};

/// Whether an option was set by the user or supplied by the toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    User,
    System,
}

/// Where an option renders relative to the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Normal,
    End,
}

/// The value carried by an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Flag(bool),
    Text(Option<String>),
    Path(Option<PathBuf>),
    Paths(Vec<PathBuf>),
    Texts(Vec<String>),
}

impl OptionValue {
    /// Whether the value renders to anything.
    pub fn is_set(&self) -> bool {
        match self {
            OptionValue::Flag(b) => *b,
            OptionValue::Text(t) => t.is_some(),
            OptionValue::Path(p) => p.is_some(),
            OptionValue::Paths(v) => !v.is_empty(),
            OptionValue::Texts(v) => !v.is_empty(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            OptionValue::Flag(_) => "flag",
            OptionValue::Text(_) => "text",
            OptionValue::Path(_) => "path",
            OptionValue::Paths(_) => "paths",
            OptionValue::Texts(_) => "texts",
        }
    }

    fn same_kind(&self, other: &OptionValue) -> bool {
        self.kind() == other.kind()
    }
}

/// A single configurable command-line option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLineOption {
    /// Stable name used to address the option (`ObjectFile`, `SafeSEH`)
    pub name: &'static str,
    /// Command-line prefix (`-o`, `/Fo`); empty for positional values
    pub flag: &'static str,
    pub value: OptionValue,
    pub scope: Scope,
    pub placement: Placement,
    /// Rendered by the owning program rather than generically
    pub manual: bool,
    /// Render the flag and value as two tokens (`-o out.o`)
    pub separate: bool,
}

impl CommandLineOption {
    fn new(name: &'static str, flag: &'static str, value: OptionValue) -> Self {
        CommandLineOption {
            name,
            flag,
            value,
            scope: Scope::User,
            placement: Placement::Normal,
            manual: false,
            separate: false,
        }
    }

    /// A boolean switch rendered as its flag when on.
    pub fn flag(name: &'static str, flag: &'static str, on: bool) -> Self {
        Self::new(name, flag, OptionValue::Flag(on))
    }

    pub fn text(name: &'static str, flag: &'static str) -> Self {
        Self::new(name, flag, OptionValue::Text(None))
    }

    pub fn path(name: &'static str, flag: &'static str) -> Self {
        Self::new(name, flag, OptionValue::Path(None))
    }

    pub fn paths(name: &'static str, flag: &'static str) -> Self {
        Self::new(name, flag, OptionValue::Paths(Vec::new()))
    }

    pub fn texts(name: &'static str, flag: &'static str) -> Self {
        Self::new(name, flag, OptionValue::Texts(Vec::new()))
    }

    /// Set a default value.
    pub fn with_value(mut self, value: OptionValue) -> Self {
        self.value = value;
        self
    }

    pub fn separate(mut self) -> Self {
        self.separate = true;
        self
    }

    pub fn at_end(mut self) -> Self {
        self.placement = Placement::End;
        self
    }

    pub fn manual(mut self) -> Self {
        self.manual = true;
        self
    }

    pub fn system(mut self) -> Self {
        self.scope = Scope::System;
        self
    }

    /// Render this option to command-line tokens.
    pub fn render(&self) -> Vec<String> {
        let mut out = Vec::new();
        match &self.value {
            OptionValue::Flag(true) => out.push(self.flag.to_string()),
            OptionValue::Flag(false) => {}
            OptionValue::Text(Some(t)) => self.push_value(&mut out, t),
            OptionValue::Path(Some(p)) => self.push_value(&mut out, &p.display().to_string()),
            OptionValue::Text(None) | OptionValue::Path(None) => {}
            OptionValue::Paths(ps) => {
                for p in ps {
                    self.push_value(&mut out, &p.display().to_string());
                }
            }
            OptionValue::Texts(ts) => {
                for t in ts {
                    self.push_value(&mut out, t);
                }
            }
        }
        out
    }

    fn push_value(&self, out: &mut Vec<String>, value: &str) {
        if self.flag.is_empty() {
            out.push(value.to_string());
        } else if self.separate {
            out.push(self.flag.to_string());
            out.push(value.to_string());
        } else {
            out.push(format!("{}{}", self.flag, value));
        }
    }
}

/// A named aggregate of options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionGroup {
    pub name: &'static str,
    /// Token emitted before every rendered token of this group (`-Xclang`)
    pub prefix: Option<&'static str>,
    pub options: Vec<CommandLineOption>,
}

impl OptionGroup {
    pub fn new(name: &'static str, options: Vec<CommandLineOption>) -> Self {
        OptionGroup {
            name,
            prefix: None,
            options,
        }
    }

    pub fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

/// The ordered option groups a program mixes in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    groups: Vec<OptionGroup>,
}

impl OptionSet {
    pub fn new(groups: Vec<OptionGroup>) -> Self {
        OptionSet { groups }
    }

    /// Append another group.
    pub fn push(&mut self, group: OptionGroup) {
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[OptionGroup] {
        &self.groups
    }

    /// All options in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandLineOption> {
        self.groups.iter().flat_map(|g| g.options.iter())
    }

    /// Whether any group declares `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&CommandLineOption> {
        self.iter().find(|o| o.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut CommandLineOption> {
        self.groups
            .iter_mut()
            .flat_map(|g| g.options.iter_mut())
            .find(|o| o.name == name)
    }

    /// Replace the value of a declared option.
    ///
    /// Returns `false` when no group declares `name` or the value kind does
    /// not match the declaration; the set is left unchanged.
    pub fn set(&mut self, name: &str, value: OptionValue) -> bool {
        match self.get_mut(name) {
            Some(opt) if opt.value.same_kind(&value) => {
                opt.value = value;
                true
            }
            _ => false,
        }
    }

    /// Append paths to a declared `Paths` option.
    pub fn extend_paths(&mut self, name: &str, paths: impl IntoIterator<Item = PathBuf>) -> bool {
        match self.get_mut(name) {
            Some(CommandLineOption {
                value: OptionValue::Paths(existing),
                ..
            }) => {
                existing.extend(paths);
                true
            }
            _ => false,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(
            self.get(name),
            Some(CommandLineOption {
                value: OptionValue::Flag(true),
                ..
            })
        )
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name).map(|o| &o.value) {
            Some(OptionValue::Text(Some(t))) => Some(t),
            _ => None,
        }
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        match self.get(name).map(|o| &o.value) {
            Some(OptionValue::Path(Some(p))) => Some(p),
            _ => None,
        }
    }

    pub fn paths(&self, name: &str) -> &[PathBuf] {
        match self.get(name).map(|o| &o.value) {
            Some(OptionValue::Paths(ps)) => ps,
            _ => &[],
        }
    }

    /// Tokens of the toolchain-supplied options that are set.
    pub fn render_system(&self) -> Vec<String> {
        self.iter()
            .filter(|o| o.scope == Scope::System)
            .flat_map(|o| o.render())
            .collect()
    }

    /// Render every non-manual option whose placement matches.
    pub fn render(&self, placement: Placement) -> Vec<String> {
        let mut out = Vec::new();
        for group in &self.groups {
            for opt in &group.options {
                if opt.manual || opt.placement != placement {
                    continue;
                }
                for token in opt.render() {
                    if let Some(prefix) = group.prefix {
                        out.push(prefix.to_string());
                    }
                    out.push(token);
                }
            }
        }
        out
    }
}

/// Vendor-neutral build settings of one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeOptions {
    /// Preprocessor defines (name, optional value)
    pub definitions: Vec<(String, Option<String>)>,
    pub include_directories: Vec<PathBuf>,
    pub link_directories: Vec<PathBuf>,
    /// Libraries by bare name (`m`) or path (`/opt/lib/libz.a`)
    pub link_libraries: Vec<PathBuf>,
    /// Extra raw compiler arguments
    pub compile_options: Vec<String>,
    /// Extra raw linker arguments
    pub link_options: Vec<String>,
}

impl NativeOptions {
    pub fn define(&mut self, name: impl Into<String>, value: Option<String>) -> &mut Self {
        self.definitions.push((name.into(), value));
        self
    }

    pub fn include_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.include_directories.push(dir.into());
        self
    }

    pub fn link_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.link_directories.push(dir.into());
        self
    }

    pub fn link_library(&mut self, lib: impl Into<PathBuf>) -> &mut Self {
        self.link_libraries.push(lib.into());
        self
    }

    pub fn compile_option(&mut self, opt: impl Into<String>) -> &mut Self {
        self.compile_options.push(opt.into());
        self
    }
}

/// User settings plus toolchain-supplied system settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeSettings {
    pub user: NativeOptions,
    pub system: NativeOptions,
}

impl NativeSettings {
    /// Link directories, system scope first.
    pub fn gather_link_directories(&self) -> Vec<PathBuf> {
        self.system
            .link_directories
            .iter()
            .chain(&self.user.link_directories)
            .cloned()
            .collect()
    }

    /// Link libraries, system scope first.
    pub fn gather_link_libraries(&self) -> Vec<PathBuf> {
        self.system
            .link_libraries
            .iter()
            .chain(&self.user.link_libraries)
            .cloned()
            .collect()
    }
}

/// Whether a library reference is a bare name (`m`, `pthread`) rather
/// than a file.
pub fn is_bare_library_name(lib: &Path) -> bool {
    lib.components().count() == 1 && lib.extension().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OptionSet {
        OptionSet::new(vec![
            OptionGroup::new(
                "compile",
                vec![
                    CommandLineOption::flag("CompileWithoutLinking", "-c", true),
                    CommandLineOption::path("OutputFile", "-o").separate(),
                    CommandLineOption::paths("Libraries", "").at_end(),
                    CommandLineOption::text("Special", "-special=").manual(),
                ],
            ),
            OptionGroup::new(
                "clang",
                vec![CommandLineOption::texts("Extra", "-fcolor-")],
            )
            .with_prefix("-Xclang"),
        ])
    }

    #[test]
    fn test_render_order_and_placement() {
        let mut set = sample();
        assert!(set.set("OutputFile", OptionValue::Path(Some("a.o".into()))));
        assert!(set.set("Special", OptionValue::Text(Some("x".into()))));
        assert!(set.extend_paths("Libraries", vec![PathBuf::from("libz.a")]));

        assert_eq!(set.render(Placement::Normal), vec!["-c", "-o", "a.o"]);
        assert_eq!(set.render(Placement::End), vec!["libz.a"]);
    }

    #[test]
    fn test_system_options() {
        let mut set = OptionSet::new(vec![OptionGroup::new(
            "link",
            vec![
                CommandLineOption::path("Output", "-o").separate(),
                CommandLineOption::texts("SystemLibraries", "-l").at_end().system(),
                CommandLineOption::text("Machine", "/MACHINE:").system(),
            ],
        )]);
        set.set("Output", OptionValue::Path(Some("app".into())));
        set.set("SystemLibraries", OptionValue::Texts(vec!["m".into(), "dl".into()]));

        assert_eq!(set.render_system(), vec!["-lm", "-ldl"]);
        assert_eq!(set.render(Placement::Normal), vec!["-o", "app"]);
        assert_eq!(set.render(Placement::End), vec!["-lm", "-ldl"]);
    }

    #[test]
    fn test_group_prefix() {
        let mut set = sample();
        set.set(
            "Extra",
            OptionValue::Texts(vec!["diagnostics".into(), "always".into()]),
        );
        let rendered = set.render(Placement::Normal);
        assert_eq!(
            &rendered[1..],
            &["-Xclang", "-fcolor-diagnostics", "-Xclang", "-fcolor-always"]
        );
    }

    #[test]
    fn test_set_rejects_unknown_or_mismatched() {
        let mut set = sample();
        assert!(!set.set("Missing", OptionValue::Flag(true)));
        assert!(!set.set("OutputFile", OptionValue::Flag(true)));
        assert!(set.path("OutputFile").is_none());
        assert!(set.flag("CompileWithoutLinking"));
    }

    #[test]
    fn test_joined_rendering() {
        let opt = CommandLineOption::path("ObjectFile", "/Fo")
            .with_value(OptionValue::Path(Some("x.obj".into())));
        assert_eq!(opt.render(), vec!["/Fox.obj"]);
    }

    #[test]
    fn test_gather_system_first() {
        let mut settings = NativeSettings::default();
        settings.user.link_dir("/user");
        settings.system.link_dir("/lib");
        settings.system.link_library("m");
        settings.user.link_library("z");
        assert_eq!(
            settings.gather_link_directories(),
            vec![PathBuf::from("/lib"), PathBuf::from("/user")]
        );
        assert_eq!(
            settings.gather_link_libraries(),
            vec![PathBuf::from("m"), PathBuf::from("z")]
        );
    }

    #[test]
    fn test_bare_library_name() {
        assert!(is_bare_library_name(Path::new("pthread")));
        assert!(!is_bare_library_name(Path::new("libz.a")));
        assert!(!is_bare_library_name(Path::new("/opt/lib/foo")));
    }
}
