// Worker Selection

use std::collections::BTreeSet;

/// Flag carrying the comma-separated worker allow-list
pub const WORKERS_FLAG: &str = "--workers";

/// Optional allow-list of worker names to run.
///
/// `All` runs every registered worker. `Only` restricts both start-up and
/// shutdown to the named workers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkerSelection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl WorkerSelection {
    /// Parse a comma-separated list (`"a, b,,c"`). Blank input selects all.
    pub fn parse(value: &str) -> Self {
        let names: BTreeSet<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            Self::All
        } else {
            Self::Only(names)
        }
    }

    /// Find `--workers=a,b` (or `--workers a,b`) in raw process arguments
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            if let Some(value) = arg
                .strip_prefix(WORKERS_FLAG)
                .and_then(|rest| rest.strip_prefix('='))
            {
                return Self::parse(value);
            }
            if arg == WORKERS_FLAG {
                return match args.next() {
                    Some(value) => Self::parse(value.as_ref()),
                    None => Self::All,
                };
            }
        }
        Self::All
    }

    /// Build from an optional flag value as produced by an argument parser
    pub fn from_flag(value: Option<&str>) -> Self {
        value.map(Self::parse).unwrap_or_default()
    }

    pub fn includes(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(name),
        }
    }

    /// Requested names, empty for `All`
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::All => Vec::new(),
            Self::Only(names) => names.iter().cloned().collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_drops_empty_entries() {
        let selection = WorkerSelection::parse(" a, b,,c ");
        assert_eq!(selection.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_blank_selects_all() {
        assert!(WorkerSelection::parse("").is_all());
        assert!(WorkerSelection::parse(" , ").is_all());
    }

    #[test]
    fn test_from_args_equals_form() {
        let selection = WorkerSelection::from_args(["processor", "--workers=hello,basic"]);
        assert!(selection.includes("hello"));
        assert!(selection.includes("basic"));
        assert!(!selection.includes("other"));
    }

    #[test]
    fn test_from_args_separate_value() {
        let selection = WorkerSelection::from_args(["processor", "--workers", "hello"]);
        assert_eq!(selection.names(), vec!["hello"]);
    }

    #[test]
    fn test_from_args_absent_flag_selects_all() {
        let selection = WorkerSelection::from_args(["processor", "--config", "x.toml"]);
        assert!(selection.is_all());
        assert!(selection.includes("anything"));
    }

    #[test]
    fn test_from_args_ignores_similar_flags() {
        let selection = WorkerSelection::from_args(["processor", "--workersx=a"]);
        assert!(selection.is_all());
    }
}
